//! Field lookups, search and ordering over stored records.
//!
//! Lookups use the double-underscore syntax: `name__icontains`,
//! `created__year`, `customer__id__exact`. Relation fields can be spanned by
//! naming a field of the related model after them.

use std::cmp::Ordering;

use admin_mis_core::{MisError, MisResult};
use chrono::Datelike;
use serde_json::Value;

use crate::fields::{loose_eq, FieldType};
use crate::model::{ModelMeta, ModelRegistry};
use crate::store::{Record, Tables};
use crate::validators::parse_datetime;

/// The comparison applied by a [`Lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Exact,
    IExact,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    In,
    Gt,
    Gte,
    Lt,
    Lte,
    IsNull,
    Year,
    Month,
    Day,
}

impl LookupKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "exact" => Self::Exact,
            "iexact" => Self::IExact,
            "contains" => Self::Contains,
            "icontains" => Self::IContains,
            "startswith" => Self::StartsWith,
            "istartswith" => Self::IStartsWith,
            "in" => Self::In,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "isnull" => Self::IsNull,
            "year" => Self::Year,
            "month" => Self::Month,
            "day" => Self::Day,
            _ => return None,
        })
    }
}

/// Read access shared by lookups that span relations.
#[derive(Debug, Clone, Copy)]
pub struct QueryContext<'a> {
    pub registry: &'a ModelRegistry,
    pub tables: &'a Tables,
}

/// A parsed `field__lookup=value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    /// Field names from the queried model to the compared field.
    pub path: Vec<String>,
    pub kind: LookupKind,
    pub value: Value,
}

impl Lookup {
    /// Parses a lookup key against `meta`.
    ///
    /// # Errors
    ///
    /// Returns [`MisError::BadRequest`] when a path segment does not name a
    /// field, or a relation is spanned into an unregistered model.
    pub fn parse(
        registry: &ModelRegistry,
        meta: &ModelMeta,
        key: &str,
        value: Value,
    ) -> MisResult<Self> {
        let mut parts: Vec<&str> = key.split("__").collect();
        let kind = match parts.last().and_then(|p| LookupKind::from_name(p)) {
            Some(kind) if parts.len() > 1 => {
                parts.pop();
                kind
            }
            _ => LookupKind::Exact,
        };

        let mut path = Vec::with_capacity(parts.len());
        resolve_fields(registry, meta, &parts, &mut path)?;
        Ok(Self { path, kind, value })
    }

    /// Whether `record` (a row of `meta`) satisfies this lookup.
    pub fn matches(&self, ctx: QueryContext<'_>, meta: &ModelMeta, record: &Record) -> bool {
        let values = resolve_path(ctx, meta, record, &self.path);
        if self.kind == LookupKind::IsNull {
            let want_null = truthy(&self.value);
            let is_null = values.iter().all(Value::is_null);
            return want_null == is_null;
        }
        values
            .iter()
            .filter(|v| !v.is_null())
            .any(|v| compare_lookup(self.kind, v, &self.value))
    }
}

fn resolve_fields(
    registry: &ModelRegistry,
    meta: &ModelMeta,
    parts: &[&str],
    path: &mut Vec<String>,
) -> MisResult<()> {
    let Some((part, rest)) = parts.split_first() else {
        return Ok(());
    };
    let name = if *part == "pk" { meta.pk_name() } else { *part };
    let field = meta.get_field(name).ok_or_else(|| {
        MisError::BadRequest(format!("Cannot resolve keyword '{part}' into field."))
    })?;
    path.push(field.name.to_string());
    let Some(next) = rest.first() else {
        return Ok(());
    };
    let target = field.related_model().ok_or_else(|| {
        MisError::BadRequest(format!(
            "Unsupported lookup '{next}' for {} or join on the field not permitted.",
            field.name
        ))
    })?;
    let related = registry.get_by_label(target).ok_or_else(|| {
        MisError::BadRequest(format!("Related model '{target}' is not registered."))
    })?;
    resolve_fields(registry, &related, rest, path)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"),
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn date_part(value: &Value, kind: LookupKind) -> Option<i64> {
    let dt = parse_datetime(value.as_str()?)?;
    Some(i64::from(match kind {
        LookupKind::Year => dt.year(),
        LookupKind::Month => i32::try_from(dt.month()).ok()?,
        _ => i32::try_from(dt.day()).ok()?,
    }))
}

fn compare_lookup(kind: LookupKind, stored: &Value, wanted: &Value) -> bool {
    match kind {
        LookupKind::Exact => loose_eq(stored, wanted) || bool_eq(stored, wanted),
        LookupKind::IExact => as_text(stored).to_lowercase() == as_text(wanted).to_lowercase(),
        LookupKind::Contains => as_text(stored).contains(&as_text(wanted)),
        LookupKind::IContains => as_text(stored)
            .to_lowercase()
            .contains(&as_text(wanted).to_lowercase()),
        LookupKind::StartsWith => as_text(stored).starts_with(&as_text(wanted)),
        LookupKind::IStartsWith => as_text(stored)
            .to_lowercase()
            .starts_with(&as_text(wanted).to_lowercase()),
        LookupKind::In => match wanted {
            Value::Array(items) => items.iter().any(|w| loose_eq(stored, w)),
            other => as_text(other)
                .split(',')
                .any(|w| loose_eq(stored, &Value::String(w.trim().to_string()))),
        },
        LookupKind::Gt => compare_values(Some(stored), Some(wanted)) == Ordering::Greater,
        LookupKind::Gte => compare_values(Some(stored), Some(wanted)) != Ordering::Less,
        LookupKind::Lt => compare_values(Some(stored), Some(wanted)) == Ordering::Less,
        LookupKind::Lte => compare_values(Some(stored), Some(wanted)) != Ordering::Greater,
        LookupKind::Year | LookupKind::Month | LookupKind::Day => {
            let wanted = match wanted {
                Value::Number(n) => n.as_i64(),
                other => as_text(other).trim().parse().ok(),
            };
            wanted.is_some() && date_part(stored, kind) == wanted
        }
        LookupKind::IsNull => false,
    }
}

fn bool_eq(stored: &Value, wanted: &Value) -> bool {
    match (stored, wanted) {
        (Value::Bool(b), Value::String(s)) => match s.as_str() {
            "1" | "True" | "true" => *b,
            "0" | "False" | "false" => !*b,
            _ => false,
        },
        _ => false,
    }
}

/// Resolves a field path on a record, following relations.
///
/// Many-to-many hops fan out, so the result can hold several values.
pub fn resolve_path(
    ctx: QueryContext<'_>,
    meta: &ModelMeta,
    record: &Record,
    path: &[String],
) -> Vec<Value> {
    let Some((head, rest)) = path.split_first() else {
        return Vec::new();
    };
    let Some(field) = meta.get_field(head) else {
        return Vec::new();
    };
    let raw = record.get(head.as_str()).cloned().unwrap_or(Value::Null);
    let values = match (&field.field_type, raw) {
        (FieldType::ManyToManyField { .. }, Value::Array(items)) => items,
        (FieldType::ManyToManyField { .. }, _) => Vec::new(),
        (_, other) => vec![other],
    };
    if rest.is_empty() {
        return values;
    }
    let Some(related) = field
        .related_model()
        .and_then(|label| ctx.registry.get_by_label(label))
    else {
        return Vec::new();
    };
    values
        .iter()
        .filter_map(Value::as_i64)
        .filter_map(|pk| ctx.tables.get(&related, pk))
        .flat_map(|row| resolve_path(ctx, &related, row, rest))
        .collect()
}

/// Keeps the records matching every lookup.
pub fn filter<'r>(
    ctx: QueryContext<'_>,
    meta: &ModelMeta,
    records: Vec<&'r Record>,
    lookups: &[Lookup],
) -> Vec<&'r Record> {
    if lookups.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|r| lookups.iter().all(|l| l.matches(ctx, meta, r)))
        .collect()
}

/// Builds the lookup used for one `search_fields` entry.
///
/// `^name` means starts-with, `=name` exact (case-insensitive), `@name` full
/// text (treated as contains); plain names use case-insensitive contains.
fn search_lookup(search_field: &str) -> (&str, LookupKind) {
    if let Some(rest) = search_field.strip_prefix('^') {
        (rest, LookupKind::IStartsWith)
    } else if let Some(rest) = search_field.strip_prefix('=') {
        (rest, LookupKind::IExact)
    } else if let Some(rest) = search_field.strip_prefix('@') {
        (rest, LookupKind::IContains)
    } else if let Some((field, kind)) = search_field
        .rsplit_once("__")
        .and_then(|(f, k)| LookupKind::from_name(k).map(|kind| (f, kind)))
    {
        (field, kind)
    } else {
        (search_field, LookupKind::IContains)
    }
}

/// Applies a search query: every whitespace-separated term must match at
/// least one of the search fields.
pub fn search<'r>(
    ctx: QueryContext<'_>,
    meta: &ModelMeta,
    records: Vec<&'r Record>,
    search_fields: &[String],
    query: &str,
) -> Vec<&'r Record> {
    let terms: Vec<&str> = query.split_whitespace().collect();
    if terms.is_empty() || search_fields.is_empty() {
        return records;
    }
    let fields: Vec<(Vec<String>, LookupKind)> = search_fields
        .iter()
        .map(|f| {
            let (path, kind) = search_lookup(f);
            (path.split("__").map(ToString::to_string).collect(), kind)
        })
        .collect();
    records
        .into_iter()
        .filter(|record| {
            terms.iter().all(|term| {
                let term = Value::String((*term).to_string());
                fields.iter().any(|(path, kind)| {
                    resolve_path(ctx, meta, record, path)
                        .iter()
                        .filter(|v| !v.is_null())
                        .any(|v| compare_lookup(*kind, v, &term))
                })
            })
        })
        .collect()
}

/// Sorts records by field names; a `-` prefix sorts descending. Ties fall
/// back to descending primary key order.
pub fn order_by(
    ctx: QueryContext<'_>,
    meta: &ModelMeta,
    records: &mut [&Record],
    ordering: &[String],
) {
    let keys: Vec<(Vec<String>, bool)> = ordering
        .iter()
        .filter(|o| !o.is_empty())
        .map(|o| {
            let (name, desc) = o
                .strip_prefix('-')
                .map_or((o.as_str(), false), |rest| (rest, true));
            let name = if name == "pk" { meta.pk_name() } else { name };
            (name.split("__").map(ToString::to_string).collect(), desc)
        })
        .collect();
    records.sort_by(|a, b| {
        for (path, desc) in &keys {
            let av = resolve_path(ctx, meta, a, path).into_iter().next();
            let bv = resolve_path(ctx, meta, b, path).into_iter().next();
            let ord = compare_values(av.as_ref(), bv.as_ref());
            let ord = if *desc { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        meta.pk_of(b).cmp(&meta.pk_of(a))
    });
}

/// Compares two optional JSON values for ordering. Nulls sort first.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), Some(_)) => Ordering::Less,
        (Some(_), None | Some(Value::Null)) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let num = |v: &Value| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            if let (Some(a_num), Some(b_num)) = (num(a), num(b)) {
                a_num.partial_cmp(&b_num).unwrap_or(Ordering::Equal)
            } else if let (Some(a_str), Some(b_str)) = (a.as_str(), b.as_str()) {
                a_str.cmp(b_str)
            } else if let (Some(a_bool), Some(b_bool)) = (a.as_bool(), b.as_bool()) {
                a_bool.cmp(&b_bool)
            } else {
                a.to_string().cmp(&b.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldDef, OnDelete};
    use serde_json::json;

    fn registry() -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        registry.register(
            ModelMeta::new("shop", "Customer")
                .field(FieldDef::new("name", FieldType::CharField).max_length(40)),
        );
        registry.register(
            ModelMeta::new("shop", "Order")
                .field(FieldDef::new(
                    "customer",
                    FieldType::ForeignKey {
                        to: "shop.customer".into(),
                        on_delete: OnDelete::Cascade,
                        related_name: None,
                    },
                ))
                .field(FieldDef::new("placed", FieldType::DateField))
                .field(FieldDef::new("total", FieldType::IntegerField))
                .field(FieldDef::new("paid", FieldType::BooleanField)),
        );
        registry
    }

    fn rows(values: Value) -> Vec<Record> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    fn tables(registry: &ModelRegistry) -> Tables {
        let customer = registry.get_model("shop", "customer").unwrap();
        let order = registry.get_model("shop", "order").unwrap();
        let mut tables = Tables::default();
        for row in rows(json!([{"name": "Ann"}, {"name": "Bob"}])) {
            tables.insert(&customer, row).unwrap();
        }
        for row in rows(json!([
            {"customer": 1, "placed": "2023-04-01", "total": 10, "paid": true},
            {"customer": 2, "placed": "2024-01-15", "total": 25, "paid": false},
            {"customer": 1, "placed": "2024-02-03", "total": 5, "paid": false},
        ])) {
            tables.insert(&order, row).unwrap();
        }
        tables
    }

    fn run(key: &str, value: Value) -> Vec<i64> {
        let registry = registry();
        let tables = tables(&registry);
        let order = registry.get_model("shop", "order").unwrap();
        let ctx = QueryContext {
            registry: &registry,
            tables: &tables,
        };
        let lookup = Lookup::parse(&registry, &order, key, value).unwrap();
        filter(ctx, &order, tables.all(&order), &[lookup])
            .into_iter()
            .filter_map(|r| order.pk_of(r))
            .collect()
    }

    #[test]
    fn test_exact_and_range_lookups() {
        assert_eq!(run("total", json!("25")), vec![2]);
        assert_eq!(run("total__gte", json!(10)), vec![1, 2]);
        assert_eq!(run("total__lt", json!("10")), vec![3]);
        assert_eq!(run("id__in", json!("1,3")), vec![1, 3]);
    }

    #[test]
    fn test_boolean_string_lookup() {
        assert_eq!(run("paid__exact", json!("1")), vec![1]);
        assert_eq!(run("paid", json!("False")), vec![2, 3]);
    }

    #[test]
    fn test_date_part_lookups() {
        assert_eq!(run("placed__year", json!("2024")), vec![2, 3]);
        assert_eq!(run("placed__month", json!(1)), vec![2]);
        assert_eq!(run("placed__day", json!("3")), vec![3]);
    }

    #[test]
    fn test_relation_span() {
        assert_eq!(run("customer__id__exact", json!("1")), vec![1, 3]);
        assert_eq!(run("customer__name__icontains", json!("bo")), vec![2]);
        assert_eq!(run("customer", json!(2)), vec![2]);
    }

    #[test]
    fn test_isnull() {
        assert_eq!(run("placed__isnull", json!("true")), Vec::<i64>::new());
        assert_eq!(run("placed__isnull", json!(false)), vec![1, 2, 3]);
    }

    #[test]
    fn test_unknown_field() {
        let registry = registry();
        let order = registry.get_model("shop", "order").unwrap();
        let err = Lookup::parse(&registry, &order, "colour", json!(1)).unwrap_err();
        assert_eq!(err.to_string(), "Bad request: Cannot resolve keyword 'colour' into field.");
    }

    #[test]
    fn test_search_terms_and_fields() {
        let registry = registry();
        let tables = tables(&registry);
        let order = registry.get_model("shop", "order").unwrap();
        let ctx = QueryContext {
            registry: &registry,
            tables: &tables,
        };
        let fields = vec!["customer__name".to_string(), "=total".to_string()];
        let found: Vec<i64> = search(ctx, &order, tables.all(&order), &fields, "ann")
            .into_iter()
            .filter_map(|r| order.pk_of(r))
            .collect();
        assert_eq!(found, vec![1, 3]);
        let found = search(ctx, &order, tables.all(&order), &fields, "ann 5");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_order_by() {
        let registry = registry();
        let tables = tables(&registry);
        let order = registry.get_model("shop", "order").unwrap();
        let ctx = QueryContext {
            registry: &registry,
            tables: &tables,
        };
        let mut records = tables.all(&order);
        order_by(ctx, &order, &mut records, &["-total".to_string()]);
        let pks: Vec<i64> = records.iter().filter_map(|r| order.pk_of(r)).collect();
        assert_eq!(pks, vec![2, 1, 3]);

        order_by(ctx, &order, &mut records, &["customer__name".to_string()]);
        let pks: Vec<i64> = records.iter().filter_map(|r| order.pk_of(r)).collect();
        assert_eq!(pks, vec![3, 1, 2]);
    }

    #[test]
    fn test_compare_values_numeric_strings() {
        assert_eq!(
            compare_values(Some(&json!("10")), Some(&json!(9))),
            Ordering::Greater
        );
        assert_eq!(compare_values(None, Some(&json!(1))), Ordering::Less);
    }
}
