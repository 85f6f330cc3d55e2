//! Year, month and day drill-down links for the change list.

use std::collections::BTreeSet;

use admin_mis_db::query::resolve_path;
use admin_mis_db::{ModelMeta, QueryContext, Record};
use chrono::{Datelike, NaiveDate};
use serde_json::{json, Value};

use crate::utils::{get_query_string, query_get, QueryParams};

/// Parses the date part of a stored date or datetime string.
fn stored_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?;
    NaiveDate::parse_from_str(text.get(..10)?, "%Y-%m-%d").ok()
}

/// Builds the drill-down for `field` over the filtered `records`.
///
/// Without year, month or day parameters the level is picked from the data:
/// rows all within one year start at that year's months, rows within one
/// month start at its days.
pub fn date_hierarchy(
    ctx: QueryContext<'_>,
    meta: &ModelMeta,
    field: &str,
    records: &[&Record],
    params: &QueryParams,
) -> Value {
    let year_field = format!("{field}__year");
    let month_field = format!("{field}__month");
    let day_field = format!("{field}__day");
    let generic = format!("{field}__");
    let link = |new: &[(&str, Option<&str>)]| get_query_string(params, new, &[generic.as_str()]);

    let path: Vec<String> = field.split("__").map(ToString::to_string).collect();
    let dates: BTreeSet<NaiveDate> = records
        .iter()
        .flat_map(|record| resolve_path(ctx, meta, record, &path))
        .filter_map(|v| stored_date(&v))
        .collect();

    let mut year = query_get(params, &year_field).map(ToString::to_string);
    let mut month = query_get(params, &month_field).map(ToString::to_string);
    let day = query_get(params, &day_field).map(ToString::to_string);

    if year.is_none() && month.is_none() && day.is_none() {
        if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
            if first.year() == last.year() {
                year = Some(first.year().to_string());
                if first.month() == last.month() {
                    month = Some(first.month().to_string());
                }
            }
        }
    }

    let parsed = |s: &Option<String>| s.as_deref().and_then(|v| v.parse::<u32>().ok());

    match (&year, &month, &day) {
        (Some(y), Some(m), Some(d)) => {
            let date = y
                .parse::<i32>()
                .ok()
                .and_then(|y| NaiveDate::from_ymd_opt(y, parsed(&month)?, d.parse().ok()?));
            let Some(date) = date else {
                return invalid(&link);
            };
            json!({
                "show": true,
                "back": {
                    "link": link(&[
                        (year_field.as_str(), Some(y)),
                        (month_field.as_str(), Some(m)),
                    ]),
                    "title": date.format("%B %Y").to_string(),
                },
                "choices": [{"title": date.format("%B %-d").to_string()}],
            })
        }
        (Some(y), Some(m), None) => {
            let days: BTreeSet<NaiveDate> = dates
                .iter()
                .filter(|d| d.year().to_string() == *y && Some(d.month()) == parsed(&month))
                .copied()
                .collect();
            let choices: Vec<Value> = days
                .iter()
                .map(|d| {
                    let day = d.day().to_string();
                    json!({
                        "link": link(&[
                            (year_field.as_str(), Some(y)),
                            (month_field.as_str(), Some(m)),
                            (day_field.as_str(), Some(&day)),
                        ]),
                        "title": d.format("%B %-d").to_string(),
                    })
                })
                .collect();
            json!({
                "show": true,
                "back": {"link": link(&[(year_field.as_str(), Some(y))]), "title": y},
                "choices": choices,
            })
        }
        (Some(y), None, _) => {
            let months: BTreeSet<(i32, u32)> = dates
                .iter()
                .filter(|d| d.year().to_string() == *y)
                .map(|d| (d.year(), d.month()))
                .collect();
            let choices: Vec<Value> = months
                .iter()
                .filter_map(|&(year, m)| NaiveDate::from_ymd_opt(year, m, 1))
                .map(|d| {
                    let month = d.month().to_string();
                    json!({
                        "link": link(&[
                            (year_field.as_str(), Some(y)),
                            (month_field.as_str(), Some(&month)),
                        ]),
                        "title": d.format("%B %Y").to_string(),
                    })
                })
                .collect();
            json!({
                "show": true,
                "back": {"link": link(&[]), "title": "All dates"},
                "choices": choices,
            })
        }
        _ => {
            let years: BTreeSet<i32> = dates.iter().map(Datelike::year).collect();
            let choices: Vec<Value> = years
                .iter()
                .map(|y| {
                    let year = y.to_string();
                    json!({
                        "link": link(&[(year_field.as_str(), Some(&year))]),
                        "title": year,
                    })
                })
                .collect();
            json!({
                "show": true,
                "back": Value::Null,
                "choices": choices,
            })
        }
    }
}

fn invalid(link: &dyn Fn(&[(&str, Option<&str>)]) -> String) -> Value {
    json!({
        "show": true,
        "back": {"link": link(&[]), "title": "All dates"},
        "choices": [],
    })
}
