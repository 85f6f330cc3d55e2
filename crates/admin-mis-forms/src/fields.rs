//! Field cleaning: raw submitted input to a stored value.
//!
//! [`clean_field`] performs, in order:
//!
//! 1. Required check (`"This field is required."`)
//! 2. Type coercion with the type's standard error message
//! 3. Choice and relation checks
//! 4. The field's validators, all of them, collecting every failure

use admin_mis_core::{UploadedFile, ValidationError};
use admin_mis_db::fields::{FieldDef, FieldType};
use admin_mis_db::query::{Lookup, QueryContext};
use admin_mis_db::validators::{image_dimensions, parse_datetime};
use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::data::FormData;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. %(value)s is not one of the available choices.";
pub const INVALID_MODEL_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

fn error(message: &str, code: &str) -> ValidationError {
    ValidationError::new(message, code)
}

/// What a field's input key resolved to.
enum Raw<'a> {
    Missing,
    Text(&'a str),
}

/// Cleans the input for `field` found under `key`.
///
/// `initial` is the stored value when editing; file fields keep it when no
/// new file is uploaded.
pub fn clean_field(
    ctx: QueryContext<'_>,
    field: &FieldDef,
    data: &FormData,
    key: &str,
    initial: Option<&Value>,
) -> Result<Value, Vec<ValidationError>> {
    let required = !field.blank && field.field_type != FieldType::BooleanField;
    let value = match &field.field_type {
        FieldType::FileField { upload_to } | FieldType::ImageField { upload_to } => {
            return clean_file(field, data, key, initial, upload_to, required);
        }
        FieldType::ManyToManyField { .. } => clean_m2m(ctx, field, data, key, required)?,
        FieldType::ArrayField { .. } => clean_array(ctx, field, data, key, required)?,
        ft if ft.is_range() => clean_range(ctx, field, data, key, required)?,
        _ => {
            let raw = data.get(key).map_or(Raw::Missing, Raw::Text);
            clean_scalar(ctx, field, raw, required)?
        }
    };
    run_validators(field, &value)?;
    Ok(value)
}

fn run_validators(field: &FieldDef, value: &Value) -> Result<(), Vec<ValidationError>> {
    if value.is_null() || value.as_str().is_some_and(str::is_empty) {
        return Ok(());
    }
    let errors: Vec<ValidationError> = field
        .validators
        .iter()
        .filter_map(|v| v.validate(value).err())
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// The value stored for an empty, non-required input.
fn empty_value(field: &FieldDef) -> Value {
    let text_like = matches!(
        field.field_type,
        FieldType::CharField
            | FieldType::TextField
            | FieldType::SlugField
            | FieldType::EmailField
            | FieldType::UrlField
    );
    if text_like && !field.null {
        Value::String(String::new())
    } else {
        Value::Null
    }
}

fn clean_scalar(
    ctx: QueryContext<'_>,
    field: &FieldDef,
    raw: Raw<'_>,
    required: bool,
) -> Result<Value, Vec<ValidationError>> {
    let text = match raw {
        Raw::Missing => "",
        Raw::Text(s) => s,
    };
    let trimmed = text.trim();

    if field.field_type == FieldType::BooleanField {
        return Ok(Value::Bool(matches!(
            trimmed.to_lowercase().as_str(),
            "true" | "1" | "on" | "yes"
        )));
    }
    if trimmed.is_empty() {
        return if required {
            Err(vec![error(REQUIRED, "required")])
        } else {
            Ok(empty_value(field))
        };
    }

    let value = coerce(ctx, field, trimmed).map_err(|e| vec![e])?;
    if field.choices.is_some() && !field.is_valid_choice(&value) {
        return Err(vec![error(INVALID_CHOICE, "invalid_choice").with_param("value", trimmed)]);
    }
    Ok(value)
}

#[allow(clippy::cast_possible_truncation)]
fn coerce(ctx: QueryContext<'_>, field: &FieldDef, text: &str) -> Result<Value, ValidationError> {
    match &field.field_type {
        FieldType::CharField
        | FieldType::TextField
        | FieldType::SlugField
        | FieldType::EmailField
        | FieldType::UrlField
        | FieldType::GenericIpAddressField => Ok(Value::String(text.to_string())),
        ft if ft.is_integer() => text
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| {
                // "12.0" is a whole number too
                text.parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                    .map(|f| json!(f as i64))
                    .ok_or(())
            })
            .map_err(|()| error("Enter a whole number.", "invalid")),
        FieldType::FloatField => text
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| json!(f))
            .ok_or_else(|| error("Enter a number.", "invalid")),
        FieldType::DecimalField { .. } => {
            if text.parse::<f64>().is_ok_and(f64::is_finite) {
                Ok(Value::String(text.to_string()))
            } else {
                Err(error("Enter a number.", "invalid"))
            }
        }
        FieldType::DateField => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(|d| json!(d.format("%Y-%m-%d").to_string()))
            .map_err(|_| error("Enter a valid date.", "invalid")),
        FieldType::DateTimeField => parse_datetime(text)
            .map(|dt| json!(dt.format("%Y-%m-%dT%H:%M:%S").to_string()))
            .ok_or_else(|| error("Enter a valid date/time.", "invalid")),
        FieldType::TimeField => ["%H:%M:%S%.f", "%H:%M"]
            .iter()
            .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
            .map(|t| json!(t.format("%H:%M:%S").to_string()))
            .ok_or_else(|| error("Enter a valid time.", "invalid")),
        FieldType::DurationField => parse_duration(text)
            .map(|secs| json!(duration_string(secs)))
            .ok_or_else(|| error("Enter a valid duration.", "invalid")),
        FieldType::UuidField => uuid::Uuid::parse_str(text)
            .map(|u| json!(u.hyphenated().to_string()))
            .map_err(|_| error("Enter a valid UUID.", "invalid")),
        FieldType::JsonField => {
            serde_json::from_str(text).map_err(|_| error("Enter a valid JSON.", "invalid"))
        }
        FieldType::HStoreField => clean_hstore(text),
        FieldType::GeometryField { geom_type } => clean_geometry(*geom_type, text),
        FieldType::ForeignKey { .. } | FieldType::OneToOneField { .. } => {
            let pk = text
                .parse::<i64>()
                .map_err(|_| error(INVALID_MODEL_CHOICE, "invalid_choice"))?;
            if related_choice_exists(ctx, field, pk) {
                Ok(Value::from(pk))
            } else {
                Err(error(INVALID_MODEL_CHOICE, "invalid_choice"))
            }
        }
        _ => Ok(Value::String(text.to_string())),
    }
}

/// Whether `pk` names a row of the related model allowed by `limit_choices_to`.
fn related_choice_exists(ctx: QueryContext<'_>, field: &FieldDef, pk: i64) -> bool {
    let Some(related) = field
        .related_model()
        .and_then(|label| ctx.registry.get_by_label(label))
    else {
        return false;
    };
    let Some(record) = ctx.tables.get(&related, pk) else {
        return false;
    };
    field.limit_choices_to.iter().all(|(key, value)| {
        Lookup::parse(ctx.registry, &related, key, value.clone())
            .map(|lookup| lookup.matches(ctx, &related, record))
            .unwrap_or_else(|e| {
                tracing::warn!(field = field.name, error = %e, "bad limit_choices_to lookup");
                false
            })
    })
}

fn clean_m2m(
    ctx: QueryContext<'_>,
    field: &FieldDef,
    data: &FormData,
    key: &str,
    required: bool,
) -> Result<Value, Vec<ValidationError>> {
    let items: Vec<&str> = data
        .get_list(key)
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        return if required {
            Err(vec![error(REQUIRED, "required")])
        } else {
            Ok(json!([]))
        };
    }
    let mut pks = Vec::with_capacity(items.len());
    for item in items {
        let Ok(pk) = item.parse::<i64>() else {
            return Err(vec![error("“%(pk)s” is not a valid value.", "invalid_pk_value")
                .with_param("pk", item)]);
        };
        if !related_choice_exists(ctx, field, pk) {
            return Err(vec![error(INVALID_CHOICE, "invalid_choice").with_param("value", item)]);
        }
        if !pks.contains(&pk) {
            pks.push(pk);
        }
    }
    Ok(json!(pks))
}

fn clean_array(
    ctx: QueryContext<'_>,
    field: &FieldDef,
    data: &FormData,
    key: &str,
    required: bool,
) -> Result<Value, Vec<ValidationError>> {
    let items: Vec<String> = if data.is_list(key) {
        data.get_list(key).to_vec()
    } else {
        data.get(key)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.split(',').map(ToString::to_string).collect())
            .unwrap_or_default()
    };
    if items.is_empty() {
        return if required {
            Err(vec![error(REQUIRED, "required")])
        } else if field.null {
            Ok(Value::Null)
        } else {
            Ok(json!([]))
        };
    }
    let Some(base) = field.base_field.as_deref() else {
        return Ok(json!(items));
    };

    let mut values = Vec::with_capacity(items.len());
    let mut errors = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let cleaned = clean_scalar(ctx, base, Raw::Text(item), true)
            .and_then(|v| run_validators(base, &v).map(|()| v));
        match cleaned {
            Ok(v) => values.push(v),
            Err(item_errors) => errors.extend(item_errors.into_iter().map(|e| {
                error(
                    "Item %(nth)s in the array did not validate: %(message)s",
                    "item_invalid",
                )
                .with_param("nth", (i + 1).to_string())
                .with_param("message", e.render())
            })),
        }
    }
    if errors.is_empty() {
        Ok(Value::Array(values))
    } else {
        Err(errors)
    }
}

fn clean_range(
    ctx: QueryContext<'_>,
    field: &FieldDef,
    data: &FormData,
    key: &str,
    required: bool,
) -> Result<Value, Vec<ValidationError>> {
    // Either a JSON object {"lower": .., "upper": ..} or split `key_0` / `key_1` inputs.
    let (lower, upper) = match data.get(key).map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => {
            let parsed: Value = serde_json::from_str(text)
                .map_err(|_| vec![error("Enter two valid values.", "invalid")])?;
            let bound = |name: &str| match parsed.get(name) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            };
            (bound("lower"), bound("upper"))
        }
        None => (
            data.get(&format!("{key}_0")).unwrap_or_default().to_string(),
            data.get(&format!("{key}_1")).unwrap_or_default().to_string(),
        ),
    };
    if lower.trim().is_empty() && upper.trim().is_empty() {
        return if required {
            Err(vec![error(REQUIRED, "required")])
        } else {
            Ok(Value::Null)
        };
    }
    let Some(base) = field.base_field.as_deref() else {
        return Ok(json!({"lower": lower, "upper": upper, "bounds": "[)"}));
    };
    let lower = clean_scalar(ctx, base, Raw::Text(&lower), false)?;
    let upper = clean_scalar(ctx, base, Raw::Text(&upper), false)?;
    if !lower.is_null()
        && !upper.is_null()
        && admin_mis_db::query::compare_values(Some(&lower), Some(&upper))
            == std::cmp::Ordering::Greater
    {
        return Err(vec![error(
            "The start of the range must not exceed the end of the range.",
            "bound_ordering",
        )]);
    }
    Ok(json!({"lower": lower, "upper": upper, "bounds": "[)"}))
}

fn clean_hstore(text: &str) -> Result<Value, ValidationError> {
    let parsed: Value = serde_json::from_str(text)
        .map_err(|_| error("Could not load JSON data.", "invalid_json"))?;
    let Value::Object(map) = parsed else {
        return Err(error("Input must be a JSON dictionary.", "invalid_format"));
    };
    let normalized: Map<String, Value> = map
        .into_iter()
        .map(|(k, v)| {
            let v = match v {
                Value::Null | Value::String(_) => v,
                other => Value::String(other.to_string()),
            };
            (k, v)
        })
        .collect();
    Ok(Value::Object(normalized))
}

static WKT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:SRID=\d+;)?\s*([A-Z]+)\s*(?:Z|M|ZM)?\s*\(.*\)$",
        r"|^(?i:(?:SRID=\d+;)?\s*[A-Z]+\s+EMPTY)$",
    ))
    .expect("valid regex")
});

fn clean_geometry(
    geom_type: admin_mis_db::fields::GeometryType,
    text: &str,
) -> Result<Value, ValidationError> {
    let invalid = || error("Invalid geometry value.", "invalid_geom");
    let (value, type_name) = if text.starts_with('{') {
        let parsed: Value = serde_json::from_str(text).map_err(|_| invalid())?;
        let type_name = parsed
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(invalid)?
            .to_string();
        (parsed, type_name)
    } else {
        let caps = WKT_RE.captures(text).ok_or_else(invalid)?;
        let type_name = caps
            .get(1)
            .map(|m| m.as_str().to_string())
            .or_else(|| {
                text.split(';')
                    .last()
                    .and_then(|rest| rest.split_whitespace().next())
                    .map(ToString::to_string)
            })
            .ok_or_else(invalid)?;
        (Value::String(text.to_string()), type_name)
    };
    if geom_type.accepts(&type_name) {
        Ok(value)
    } else {
        Err(error("Invalid geometry type.", "invalid_geom_type"))
    }
}

fn clean_file(
    field: &FieldDef,
    data: &FormData,
    key: &str,
    initial: Option<&Value>,
    upload_to: &str,
    required: bool,
) -> Result<Value, Vec<ValidationError>> {
    let initial = initial.filter(|v| v.as_str().is_some_and(|s| !s.is_empty()));
    let Some(file) = data.file(key) else {
        if data.get(key).is_some_and(|s| !s.trim().is_empty()) && initial.is_none() {
            return Err(vec![error(
                "No file was submitted. Check the encoding type on the form.",
                "invalid",
            )]);
        }
        if let Some(existing) = initial {
            return Ok(existing.clone());
        }
        return if required {
            Err(vec![error(REQUIRED, "required")])
        } else {
            Ok(empty_value(field))
        };
    };
    validate_upload(field, file).map(|()| Value::String(format!("{upload_to}{}", file.name)))
}

fn validate_upload(field: &FieldDef, file: &UploadedFile) -> Result<(), Vec<ValidationError>> {
    if file.name.is_empty() {
        return Err(vec![error("No file was submitted.", "invalid")]);
    }
    if file.content.is_empty() {
        return Err(vec![error("The submitted file is empty.", "empty")]);
    }
    if let Some(max) = field.max_length {
        let length = file.name.chars().count();
        if length > max {
            return Err(vec![error(
                "Ensure this filename has at most %(max)d characters (it has %(length)d).",
                "max_length",
            )
            .with_param("max", max.to_string())
            .with_param("length", length.to_string())]);
        }
    }
    if matches!(field.field_type, FieldType::ImageField { .. })
        && image_dimensions(&file.content).is_none()
    {
        return Err(vec![error(
            "Upload a valid image. The file you uploaded was either not an image \
             or a corrupted image.",
            "invalid_image",
        )]);
    }
    let errors: Vec<ValidationError> = field
        .validators
        .iter()
        .filter_map(|v| v.validate_file(file).err())
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?:(?P<days>-?\d+) (?:days?, )?)?(?P<sign>-?)",
        r"(?:(?:(?P<hours>\d+):)?(?P<minutes>\d+):)?(?P<seconds>\d+)",
        r"(?:[.,](?P<micro>\d{1,6}))?$",
    ))
    .expect("valid regex")
});
static ISO_DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?P<sign>[-+]?)P(?:(?P<days>\d+(?:\.\d+)?)D)?",
        r"(?:T(?:(?P<hours>\d+(?:\.\d+)?)H)?(?:(?P<minutes>\d+(?:\.\d+)?)M)?",
        r"(?:(?P<seconds>\d+(?:\.\d+)?)S)?)?$",
    ))
    .expect("valid regex")
});

/// Parses `"[D [days, ]][[HH:]MM:]SS[.uuuuuu]"` or ISO 8601 (`"P4DT1H15M"`)
/// into seconds.
#[allow(clippy::cast_possible_truncation)]
pub fn parse_duration(text: &str) -> Option<i64> {
    let num = |caps: &regex::Captures<'_>, name: &str| -> f64 {
        caps.name(name)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0)
    };
    if let Some(caps) = DURATION_RE.captures(text) {
        let sign = if caps.name("sign").is_some_and(|m| m.as_str() == "-") {
            -1.0
        } else {
            1.0
        };
        let days = num(&caps, "days");
        let rest =
            num(&caps, "hours") * 3600.0 + num(&caps, "minutes") * 60.0 + num(&caps, "seconds");
        return Some((days * 86_400.0 + sign * rest) as i64);
    }
    let caps = ISO_DURATION_RE.captures(text)?;
    if text.ends_with('P') || text.ends_with('T') {
        return None;
    }
    let sign = if caps.name("sign").is_some_and(|m| m.as_str() == "-") {
        -1.0
    } else {
        1.0
    };
    let total = num(&caps, "days") * 86_400.0
        + num(&caps, "hours") * 3600.0
        + num(&caps, "minutes") * 60.0
        + num(&caps, "seconds");
    Some((sign * total) as i64)
}

/// Formats seconds as `"[D ]HH:MM:SS"`.
pub fn duration_string(total_seconds: i64) -> String {
    let days = total_seconds.div_euclid(86_400);
    let rest = total_seconds.rem_euclid(86_400);
    let clock = format!("{:02}:{:02}:{:02}", rest / 3600, (rest % 3600) / 60, rest % 60);
    if days == 0 {
        clock
    } else {
        format!("{days} {clock}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_mis_db::fields::{GeometryType, OnDelete};
    use admin_mis_db::model::{ModelMeta, ModelRegistry};
    use admin_mis_db::store::Tables;
    use admin_mis_db::validators::{FileExtensionValidator, MaxValueValidator, Limit};

    struct Fixture {
        registry: ModelRegistry,
        tables: Tables,
    }

    impl Fixture {
        fn new() -> Self {
            let mut registry = ModelRegistry::new();
            let tag = registry.register(
                ModelMeta::new("demo", "Tag")
                    .field(FieldDef::new("name", FieldType::CharField).max_length(20)),
            );
            let mut tables = Tables::default();
            for name in ["fancy", "plain"] {
                let row = json!({"name": name}).as_object().cloned().unwrap();
                tables.insert(&tag, row).unwrap();
            }
            Self { registry, tables }
        }

        fn ctx(&self) -> QueryContext<'_> {
            QueryContext {
                registry: &self.registry,
                tables: &self.tables,
            }
        }

        fn clean(&self, field: FieldDef, input: Value) -> Result<Value, Vec<String>> {
            let field = field.finalize();
            let data = FormData::from_json(&json!({ "f": input }));
            clean_field(self.ctx(), &field, &data, "f", None)
                .map_err(|errs| errs.iter().map(ValidationError::render).collect())
        }
    }

    fn fk(limit: bool) -> FieldDef {
        let field = FieldDef::new(
            "tag",
            FieldType::ForeignKey {
                to: "demo.tag".into(),
                on_delete: OnDelete::Cascade,
                related_name: None,
            },
        );
        if limit {
            field.limit_choices_to("name__icontains", "anc")
        } else {
            field
        }
    }

    #[test]
    fn test_required_and_empty() {
        let fx = Fixture::new();
        let name = || FieldDef::new("f", FieldType::CharField).max_length(5);
        assert_eq!(fx.clean(name(), json!("")).unwrap_err(), [REQUIRED]);
        assert_eq!(fx.clean(name().blank(), json!(null)).unwrap(), json!(""));
        assert_eq!(
            fx.clean(FieldDef::new("f", FieldType::IntegerField).blank().nullable(), json!(""))
                .unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_char_strips_and_limits() {
        let fx = Fixture::new();
        let field = || FieldDef::new("f", FieldType::CharField).max_length(5);
        assert_eq!(fx.clean(field(), json!("  hi ")).unwrap(), json!("hi"));
        assert_eq!(
            fx.clean(field(), json!("toolong")).unwrap_err(),
            ["Ensure this value has at most 5 characters (it has 7)."]
        );
    }

    #[test]
    fn test_numbers() {
        let fx = Fixture::new();
        let int = || FieldDef::new("f", FieldType::IntegerField);
        assert_eq!(fx.clean(int(), json!("42")).unwrap(), json!(42));
        assert_eq!(fx.clean(int(), json!(7)).unwrap(), json!(7));
        assert_eq!(fx.clean(int(), json!("4.5")).unwrap_err(), ["Enter a whole number."]);
        assert_eq!(
            fx.clean(FieldDef::new("f", FieldType::FloatField), json!("x")).unwrap_err(),
            ["Enter a number."]
        );
        let capped = FieldDef::new("f", FieldType::IntegerField)
            .validator(MaxValueValidator::new(Limit::Int(200)));
        assert_eq!(
            fx.clean(capped, json!(201)).unwrap_err(),
            ["Ensure this value is less than or equal to 200."]
        );
        assert_eq!(
            fx.clean(FieldDef::new("f", FieldType::PositiveSmallIntegerField), json!(-1))
                .unwrap_err(),
            ["Ensure this value is greater than or equal to 0."]
        );
    }

    #[test]
    fn test_decimal_digits() {
        let fx = Fixture::new();
        let field = || {
            FieldDef::new(
                "f",
                FieldType::DecimalField {
                    max_digits: Some(4),
                    decimal_places: Some(2),
                },
            )
        };
        assert_eq!(fx.clean(field(), json!("12.50")).unwrap(), json!("12.50"));
        assert_eq!(
            fx.clean(field(), json!("1.234")).unwrap_err(),
            ["Ensure that there are no more than 2 decimal places."]
        );
    }

    #[test]
    fn test_boolean_never_required() {
        let fx = Fixture::new();
        let field = || FieldDef::new("f", FieldType::BooleanField);
        assert_eq!(fx.clean(field(), json!("")).unwrap(), json!(false));
        assert_eq!(fx.clean(field(), json!(true)).unwrap(), json!(true));
        assert_eq!(fx.clean(field(), json!("on")).unwrap(), json!(true));
    }

    #[test]
    fn test_dates_and_times() {
        let fx = Fixture::new();
        assert_eq!(
            fx.clean(FieldDef::new("f", FieldType::DateField), json!("2024-02-30"))
                .unwrap_err(),
            ["Enter a valid date."]
        );
        assert_eq!(
            fx.clean(FieldDef::new("f", FieldType::DateTimeField), json!("2024-02-03 10:20"))
                .unwrap(),
            json!("2024-02-03T10:20:00")
        );
        assert_eq!(
            fx.clean(FieldDef::new("f", FieldType::TimeField), json!("9:30")).unwrap(),
            json!("09:30:00")
        );
        assert_eq!(
            fx.clean(FieldDef::new("f", FieldType::DurationField), json!("1 02:03:04"))
                .unwrap(),
            json!("1 02:03:04")
        );
    }

    #[test]
    fn test_uuid_json_and_email() {
        let fx = Fixture::new();
        assert_eq!(
            fx.clean(FieldDef::new("f", FieldType::UuidField), json!("nope")).unwrap_err(),
            ["Enter a valid UUID."]
        );
        assert_eq!(
            fx.clean(FieldDef::new("f", FieldType::JsonField), json!({"a": [1]})).unwrap(),
            json!({"a": [1]})
        );
        assert_eq!(
            fx.clean(FieldDef::new("f", FieldType::JsonField), json!("{bad")).unwrap_err(),
            ["Enter a valid JSON."]
        );
        assert_eq!(
            fx.clean(FieldDef::new("f", FieldType::EmailField), json!("no-at")).unwrap_err(),
            ["Enter a valid email address."]
        );
    }

    #[test]
    fn test_choices() {
        let fx = Fixture::new();
        let field = || FieldDef::new("f", FieldType::CharField).choices(&[("a", "A")]);
        assert_eq!(fx.clean(field(), json!("a")).unwrap(), json!("a"));
        assert_eq!(
            fx.clean(field(), json!("z")).unwrap_err(),
            ["Select a valid choice. z is not one of the available choices."]
        );
    }

    #[test]
    fn test_foreign_key_and_limit_choices() {
        let fx = Fixture::new();
        assert_eq!(fx.clean(fk(false), json!(2)).unwrap(), json!(2));
        assert_eq!(fx.clean(fk(true), json!(1)).unwrap(), json!(1));
        assert_eq!(fx.clean(fk(true), json!(2)).unwrap_err(), [INVALID_MODEL_CHOICE]);
        assert_eq!(fx.clean(fk(false), json!(99)).unwrap_err(), [INVALID_MODEL_CHOICE]);
    }

    #[test]
    fn test_many_to_many() {
        let fx = Fixture::new();
        let m2m = || {
            FieldDef::new(
                "f",
                FieldType::ManyToManyField {
                    to: "demo.tag".into(),
                    related_name: None,
                },
            )
        };
        assert_eq!(fx.clean(m2m(), json!([1, 2, 1])).unwrap(), json!([1, 2]));
        assert_eq!(fx.clean(m2m(), json!([])).unwrap_err(), [REQUIRED]);
        assert_eq!(
            fx.clean(m2m(), json!([5])).unwrap_err(),
            ["Select a valid choice. 5 is not one of the available choices."]
        );
        assert_eq!(
            fx.clean(m2m(), json!(["x"])).unwrap_err(),
            ["“x” is not a valid value."]
        );
    }

    #[test]
    fn test_array_items() {
        let fx = Fixture::new();
        let field = || {
            FieldDef::new("f", FieldType::ArrayField { size: Some(2) })
                .base_field(FieldDef::new("f", FieldType::IntegerField))
        };
        assert_eq!(fx.clean(field(), json!("1,2")).unwrap(), json!([1, 2]));
        assert_eq!(fx.clean(field(), json!(["3"])).unwrap(), json!([3]));
        assert_eq!(
            fx.clean(field(), json!(["1", "x"])).unwrap_err(),
            ["Item 2 in the array did not validate: Enter a whole number."]
        );
        assert_eq!(
            fx.clean(field(), json!([1, 2, 3])).unwrap_err(),
            ["List contains 3 items, it should contain no more than 2."]
        );
    }

    #[test]
    fn test_range() {
        let fx = Fixture::new();
        let field = || FieldDef::new("f", FieldType::IntegerRangeField);
        assert_eq!(
            fx.clean(field(), json!({"lower": 1, "upper": 5})).unwrap(),
            json!({"lower": 1, "upper": 5, "bounds": "[)"})
        );
        assert_eq!(
            fx.clean(field(), json!({"lower": 9, "upper": 5})).unwrap_err(),
            ["The start of the range must not exceed the end of the range."]
        );
    }

    #[test]
    fn test_hstore_and_geometry() {
        let fx = Fixture::new();
        assert_eq!(
            fx.clean(FieldDef::new("f", FieldType::HStoreField), json!({"a": 1})).unwrap(),
            json!({"a": "1"})
        );
        assert_eq!(
            fx.clean(FieldDef::new("f", FieldType::HStoreField), json!("[1]")).unwrap_err(),
            ["Input must be a JSON dictionary."]
        );
        let point = || {
            FieldDef::new(
                "f",
                FieldType::GeometryField {
                    geom_type: GeometryType::Point,
                },
            )
        };
        assert_eq!(
            fx.clean(point(), json!("SRID=4326;POINT(1 2)")).unwrap(),
            json!("SRID=4326;POINT(1 2)")
        );
        assert_eq!(
            fx.clean(point(), json!({"type": "Point", "coordinates": [1, 2]}))
                .unwrap()["type"],
            json!("Point")
        );
        assert_eq!(
            fx.clean(point(), json!("LINESTRING(0 0, 1 1)")).unwrap_err(),
            ["Invalid geometry type."]
        );
        assert_eq!(fx.clean(point(), json!("blob")).unwrap_err(), ["Invalid geometry value."]);
    }

    #[test]
    fn test_file_fields() {
        let fx = Fixture::new();
        let field = FieldDef::new(
            "doc",
            FieldType::FileField {
                upload_to: "docs/".into(),
            },
        )
        .validator(FileExtensionValidator::new(&["pdf"]))
        .finalize();

        let mut data = FormData::new();
        data.add_file("doc", UploadedFile::new("a.pdf", "application/pdf", vec![1, 2]));
        assert_eq!(
            clean_field(fx.ctx(), &field, &data, "doc", None).unwrap(),
            json!("docs/a.pdf")
        );

        let mut data = FormData::new();
        data.add_file("doc", UploadedFile::new("a.exe", "application/octet-stream", vec![1]));
        let errs = clean_field(fx.ctx(), &field, &data, "doc", None).unwrap_err();
        assert_eq!(errs[0].code, "invalid_extension");

        let empty = FormData::new();
        let kept = clean_field(fx.ctx(), &field, &empty, "doc", Some(&json!("docs/old.pdf")));
        assert_eq!(kept.unwrap(), json!("docs/old.pdf"));
        let errs = clean_field(fx.ctx(), &field, &empty, "doc", None).unwrap_err();
        assert_eq!(errs[0].render(), REQUIRED);

        let mut text = FormData::new();
        text.set("doc", "not-a-file");
        let errs = clean_field(fx.ctx(), &field, &text, "doc", None).unwrap_err();
        assert_eq!(errs[0].render(), "No file was submitted. Check the encoding type on the form.");
    }

    #[test]
    fn test_image_must_decode() {
        let fx = Fixture::new();
        let field = FieldDef::new(
            "pic",
            FieldType::ImageField {
                upload_to: String::new(),
            },
        )
        .finalize();
        let mut data = FormData::new();
        data.add_file("pic", UploadedFile::new("a.png", "image/png", b"not png".to_vec()));
        let errs = clean_field(fx.ctx(), &field, &data, "pic", None).unwrap_err();
        assert_eq!(errs[0].code, "invalid_image");
    }

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration("30"), Some(30));
        assert_eq!(parse_duration("10:00"), Some(600));
        assert_eq!(parse_duration("2 days, 1:00:00"), Some(2 * 86_400 + 3600));
        assert_eq!(parse_duration("P1DT2H"), Some(86_400 + 7200));
        assert_eq!(parse_duration("P"), None);
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(duration_string(90_061), "1 01:01:01");
    }
}
