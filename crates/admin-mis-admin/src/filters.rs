//! List filters and their choices.
//!
//! Each entry of `list_filter` becomes one filter description. Field filters
//! pick their kind from the field: relations, booleans, fields with choices,
//! dates, and finally a filter over every distinct stored value. Choices
//! carry the query string that selects them, built from the current
//! parameters.

use std::sync::Arc;

use admin_mis_db::query::{compare_values, resolve_path};
use admin_mis_db::{FieldDef, FieldType, ModelMeta, QueryContext, Record};
use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::Serialize;
use serde_json::{json, Value};

use crate::model_admin::{ListFilter, ModelAdmin, SimpleListFilter};
use crate::utils::{field_for_path, get_query_string, py_str, query_get, QueryParams};

/// Display used for a missing value.
pub const EMPTY_VALUE_DISPLAY: &str = "-";

/// One selectable filter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterChoice {
    pub selected: bool,
    pub query_string: String,
    pub display: String,
}

impl FilterChoice {
    fn new(selected: bool, query_string: String, display: impl Into<String>) -> Self {
        Self {
            selected,
            query_string,
            display: display.into(),
        }
    }
}

/// The filter descriptions for an admin's `list_filter`.
///
/// `api_root` is the absolute URL of the API root, ending in `/`. Paths that
/// do not resolve to a field are logged and skipped.
pub fn filter_specs(
    admin: &ModelAdmin,
    ctx: QueryContext<'_>,
    params: &QueryParams,
    api_root: &str,
) -> Vec<Value> {
    let mut specs = Vec::new();
    for filter in &admin.list_filter {
        match filter {
            ListFilter::Simple(simple) => specs.push(json!({
                "title": simple.title,
                "field_type": Value::Null,
                "choices": simple_choices(simple, params),
            })),
            ListFilter::Field(path) => {
                let Some((owner, name)) = field_for_path(ctx.registry, &admin.meta, path) else {
                    tracing::warn!(
                        model = %admin.model_key(),
                        filter = %path,
                        "skipping list filter on unknown field"
                    );
                    continue;
                };
                let Some(field) = owner.get_field(name) else {
                    continue;
                };
                specs.push(field_filter(admin, ctx, field, path, params, api_root));
            }
        }
    }
    specs
}

fn field_filter(
    admin: &ModelAdmin,
    ctx: QueryContext<'_>,
    field: &FieldDef,
    path: &str,
    params: &QueryParams,
    api_root: &str,
) -> Value {
    let title = field.verbose_name.clone();
    let field_type = field.field_type_name();

    if field.is_relation() {
        let target = field
            .related_model()
            .and_then(|label| ctx.registry.get_by_label(label));
        let (pk_name, admin_url) = target.map_or_else(
            || ("id", Value::Null),
            |model| {
                (
                    model.pk_name(),
                    json!(format!(
                        "{api_root}{}/{}/?filter_list=true",
                        model.app_label, model.model_name
                    )),
                )
            },
        );
        return json!({
            "title": title,
            "lookup_kwarg": format!("{path}__{pk_name}__exact"),
            "field_type": field_type,
            "admin_url": admin_url,
        });
    }

    let choices = match field.field_type {
        FieldType::BooleanField => boolean_choices(field, path, params),
        _ if field.choices.is_some() => choices_choices(field, path, params),
        FieldType::DateField | FieldType::DateTimeField => {
            date_choices(field, path, params, Local::now().date_naive())
        }
        _ => all_values_choices(&admin.meta, ctx, path, params),
    };
    json!({
        "title": title,
        "field_type": field_type,
        "choices": choices,
    })
}

fn simple_choices(filter: &SimpleListFilter, params: &QueryParams) -> Vec<FilterChoice> {
    let param = filter.parameter_name.as_str();
    let current = query_get(params, param);
    let mut choices = vec![FilterChoice::new(
        current.is_none(),
        get_query_string(params, &[], &[param]),
        "All",
    )];
    for (value, label) in &filter.lookups {
        choices.push(FilterChoice::new(
            current == Some(value.as_str()),
            get_query_string(params, &[(param, Some(value.as_str()))], &[]),
            label.clone(),
        ));
    }
    choices
}

fn choice_label(field: &FieldDef, value: &Value, fallback: &str) -> String {
    field
        .choices
        .as_ref()
        .and_then(|choices| choices.iter().find(|(v, _)| v == value))
        .map_or_else(|| fallback.to_string(), |(_, label)| label.clone())
}

fn boolean_choices(field: &FieldDef, path: &str, params: &QueryParams) -> Vec<FilterChoice> {
    let exact = format!("{path}__exact");
    let isnull = format!("{path}__isnull");
    let value = query_get(params, &exact);
    let null_value = query_get(params, &isnull);

    let mut choices = Vec::new();
    for (lookup, display) in [
        (None, "All".to_string()),
        (Some("1"), choice_label(field, &Value::Bool(true), "Yes")),
        (Some("0"), choice_label(field, &Value::Bool(false), "No")),
    ] {
        choices.push(FilterChoice::new(
            value == lookup && null_value.is_none(),
            get_query_string(params, &[(exact.as_str(), lookup)], &[isnull.as_str()]),
            display,
        ));
    }
    if field.null {
        choices.push(FilterChoice::new(
            null_value == Some("True"),
            get_query_string(params, &[(isnull.as_str(), Some("True"))], &[exact.as_str()]),
            choice_label(field, &Value::Null, "Unknown"),
        ));
    }
    choices
}

fn choices_choices(field: &FieldDef, path: &str, params: &QueryParams) -> Vec<FilterChoice> {
    let exact = format!("{path}__exact");
    let isnull = format!("{path}__isnull");
    let value = query_get(params, &exact);

    let mut choices = vec![FilterChoice::new(
        value.is_none(),
        get_query_string(params, &[], &[exact.as_str(), isnull.as_str()]),
        "All",
    )];
    let mut none_title = None;
    for (lookup, label) in field.choices.iter().flatten() {
        if lookup.is_null() {
            none_title = Some(label.clone());
            continue;
        }
        let lookup = py_str(lookup);
        choices.push(FilterChoice::new(
            value == Some(lookup.as_str()),
            get_query_string(
                params,
                &[(exact.as_str(), Some(lookup.as_str()))],
                &[isnull.as_str()],
            ),
            label.clone(),
        ));
    }
    if let Some(title) = none_title {
        choices.push(FilterChoice::new(
            query_get(params, &isnull).is_some_and(|v| !v.is_empty()),
            get_query_string(params, &[(isnull.as_str(), Some("True"))], &[exact.as_str()]),
            title,
        ));
    }
    choices
}

fn first_of_next_month(day: NaiveDate) -> NaiveDate {
    let (year, month) = if day.month() == 12 {
        (day.year() + 1, 1)
    } else {
        (day.year(), day.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(day)
}

fn date_choices(
    field: &FieldDef,
    path: &str,
    params: &QueryParams,
    today: NaiveDate,
) -> Vec<FilterChoice> {
    let generic = format!("{path}__");
    let since = format!("{path}__gte");
    let until = format!("{path}__lt");
    let isnull = format!("{path}__isnull");

    let fmt = |d: NaiveDate| d.format("%Y-%m-%d").to_string();
    let tomorrow = fmt(today + Duration::days(1));
    let month_start = today.with_day(1).unwrap_or(today);
    let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
    let next_year = NaiveDate::from_ymd_opt(today.year() + 1, 1, 1).unwrap_or(today);

    let mut links: Vec<(&str, Vec<(String, String)>)> = vec![
        ("Any date", Vec::new()),
        (
            "Today",
            vec![(since.clone(), fmt(today)), (until.clone(), tomorrow.clone())],
        ),
        (
            "Past 7 days",
            vec![
                (since.clone(), fmt(today - Duration::days(7))),
                (until.clone(), tomorrow),
            ],
        ),
        (
            "This month",
            vec![
                (since.clone(), fmt(month_start)),
                (until.clone(), fmt(first_of_next_month(today))),
            ],
        ),
        (
            "This year",
            vec![(since, fmt(year_start)), (until, fmt(next_year))],
        ),
    ];
    if field.null {
        links.push(("No date", vec![(isnull.clone(), "True".to_string())]));
        links.push(("Has date", vec![(isnull, "False".to_string())]));
    }

    let mut current: Vec<(String, String)> = params
        .iter()
        .filter(|(k, _)| k.starts_with(&generic))
        .cloned()
        .collect();
    current.sort();

    links
        .into_iter()
        .map(|(title, mut lookups)| {
            let new: Vec<(&str, Option<&str>)> = lookups
                .iter()
                .map(|(k, v)| (k.as_str(), Some(v.as_str())))
                .collect();
            let query_string = get_query_string(params, &new, &[generic.as_str()]);
            lookups.sort();
            FilterChoice::new(current == lookups, query_string, title)
        })
        .collect()
}

fn all_values_choices(
    meta: &Arc<ModelMeta>,
    ctx: QueryContext<'_>,
    path: &str,
    params: &QueryParams,
) -> Vec<FilterChoice> {
    let isnull = format!("{path}__isnull");
    let value = query_get(params, path);
    let null_value = query_get(params, &isnull);
    let segments: Vec<String> = path.split("__").map(ToString::to_string).collect();

    let mut values: Vec<Value> = ctx
        .tables
        .all(meta)
        .into_iter()
        .flat_map(|record| resolve_path(ctx, meta, record, &segments))
        .collect();
    values.sort_by(|a, b| compare_values(Some(a), Some(b)));
    values.dedup();

    let mut choices = vec![FilterChoice::new(
        value.is_none() && null_value.is_none(),
        get_query_string(params, &[], &[path, isnull.as_str()]),
        "All",
    )];
    let mut include_none = false;
    for val in &values {
        if val.is_null() {
            include_none = true;
            continue;
        }
        let val = py_str(val);
        choices.push(FilterChoice::new(
            value == Some(val.as_str()),
            get_query_string(params, &[(path, Some(val.as_str()))], &[isnull.as_str()]),
            val.clone(),
        ));
    }
    if include_none {
        choices.push(FilterChoice::new(
            null_value.is_some_and(|v| !v.is_empty()),
            get_query_string(params, &[(isnull.as_str(), Some("True"))], &[path]),
            EMPTY_VALUE_DISPLAY,
        ));
    }
    choices
}

/// Keeps the rows matching every simple filter whose parameter is set.
pub fn apply_simple_filters<'r>(
    admin: &ModelAdmin,
    params: &QueryParams,
    records: Vec<&'r Record>,
) -> Vec<&'r Record> {
    let active: Vec<(&SimpleListFilter, &str)> = admin
        .list_filter
        .iter()
        .filter_map(|f| match f {
            ListFilter::Simple(simple) => {
                query_get(params, &simple.parameter_name).map(|value| (simple, value))
            }
            ListFilter::Field(_) => None,
        })
        .collect();
    if active.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|record| active.iter().all(|(filter, value)| (filter.queryset)(value, record)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::parse_query;
    use admin_mis_db::{FieldDef, FieldType};

    fn titles(choices: &[FilterChoice]) -> Vec<&str> {
        choices.iter().map(|c| c.display.as_str()).collect()
    }

    #[test]
    fn test_boolean_choices() {
        let field = FieldDef::new("done", FieldType::BooleanField).nullable();
        let params = parse_query(Some("done__exact=1&q=x"));
        let choices = boolean_choices(&field, "done", &params);
        assert_eq!(titles(&choices), vec!["All", "Yes", "No", "Unknown"]);
        assert!(!choices[0].selected);
        assert!(choices[1].selected);
        assert_eq!(choices[0].query_string, "?q=x");
        assert_eq!(choices[2].query_string, "?done__exact=0&q=x");
        assert_eq!(choices[3].query_string, "?done__isnull=True&q=x");
    }

    #[test]
    fn test_choices_choices() {
        let field = FieldDef::new("status", FieldType::CharField)
            .max_length(1)
            .choices(&[("d", "Draft"), ("p", "Published")]);
        let choices = choices_choices(&field, "status", &Vec::new());
        assert_eq!(titles(&choices), vec!["All", "Draft", "Published"]);
        assert!(choices[0].selected);
        assert_eq!(choices[2].query_string, "?status__exact=p");
    }

    #[test]
    fn test_date_choices() {
        let field = FieldDef::new("created", FieldType::DateField);
        let today = NaiveDate::from_ymd_opt(2024, 12, 15).unwrap();
        let params = parse_query(Some("created__gte=2024-12-15&created__lt=2024-12-16"));
        let choices = date_choices(&field, "created", &params, today);
        assert_eq!(
            titles(&choices),
            vec!["Any date", "Today", "Past 7 days", "This month", "This year"]
        );
        assert!(choices[1].selected);
        assert!(!choices[0].selected);
        assert_eq!(choices[0].query_string, "?");
        assert_eq!(
            choices[3].query_string,
            "?created__gte=2024-12-01&created__lt=2025-01-01"
        );
        assert_eq!(
            choices[4].query_string,
            "?created__gte=2024-01-01&created__lt=2025-01-01"
        );
    }

    #[test]
    fn test_nullable_date_adds_presence_choices() {
        let field = FieldDef::new("closed", FieldType::DateTimeField).nullable();
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let params = parse_query(Some("closed__isnull=True"));
        let choices = date_choices(&field, "closed", &params, today);
        assert_eq!(choices.len(), 7);
        assert_eq!(choices[5].display, "No date");
        assert!(choices[5].selected);
        assert_eq!(choices[6].query_string, "?closed__isnull=False");
    }

    #[test]
    fn test_simple_choices() {
        let filter = SimpleListFilter::new("Decade", "decade", |_, _| true)
            .lookup("80s", "1980s")
            .lookup("90s", "1990s");
        let params = parse_query(Some("decade=90s"));
        let choices = simple_choices(&filter, &params);
        assert_eq!(titles(&choices), vec!["All", "1980s", "1990s"]);
        assert!(choices[2].selected);
        assert_eq!(choices[0].query_string, "?");
        assert_eq!(choices[1].query_string, "?decade=80s");
    }
}
