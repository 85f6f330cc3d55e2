//! Small helpers shared by the API handlers.

use std::sync::Arc;

use admin_mis_db::{ModelMeta, ModelRegistry};
use axum::http::{header, HeaderMap};
use serde_json::Value;
use url::form_urlencoded;

/// Query parameters in first-seen order; a repeated key keeps its last
/// value.
pub type QueryParams = Vec<(String, String)>;

/// Parses a raw query string.
pub fn parse_query(raw: Option<&str>) -> QueryParams {
    let mut params: QueryParams = Vec::new();
    for (key, value) in form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
        match params.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value.into_owned(),
            None => params.push((key.into_owned(), value.into_owned())),
        }
    }
    params
}

pub fn query_get<'a>(params: &'a QueryParams, key: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Builds `"?k=v&..."` from `params` with `new` applied (a `None` value
/// removes the key) and every key starting with one of `remove` dropped.
/// Keys are sorted.
pub fn get_query_string(
    params: &QueryParams,
    new: &[(&str, Option<&str>)],
    remove: &[&str],
) -> String {
    let mut merged: Vec<(String, String)> = params
        .iter()
        .filter(|(k, _)| !remove.iter().any(|r| k.starts_with(r)))
        .cloned()
        .collect();
    for (key, value) in new {
        merged.retain(|(k, _)| k != key);
        if let Some(value) = value {
            merged.push(((*key).to_string(), (*value).to_string()));
        }
    }
    merged.sort();
    let encoded = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(merged.iter())
        .finish();
    format!("?{encoded}")
}

/// Lowercases a URL segment and maps `-` to `_`.
pub fn normalize_name(segment: &str) -> String {
    segment.to_lowercase().replace('-', "_")
}

/// `scheme://host/` of the current request.
pub fn base_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("http");
    format!("{scheme}://{host}/")
}

/// `base` joined with a path that starts with `/`.
pub fn absolute_url(headers: &HeaderMap, path: &str) -> String {
    let base = base_url(headers);
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// The verbose name for a count: singular for one, plural otherwise.
pub fn model_ngettext(meta: &ModelMeta, n: usize) -> &str {
    if n == 1 {
        &meta.verbose_name
    } else {
        &meta.verbose_name_plural
    }
}

/// Follows a `__`-separated field path through relations and returns the
/// model owning the last field, with that field's name.
pub fn field_for_path(
    registry: &ModelRegistry,
    meta: &Arc<ModelMeta>,
    path: &str,
) -> Option<(Arc<ModelMeta>, &'static str)> {
    let mut model = Arc::clone(meta);
    let mut parts = path.split("__").peekable();
    while let Some(part) = parts.next() {
        let name = if part == "pk" { model.pk_name() } else { part };
        let field = model.get_field(name)?;
        let field_name = field.name;
        if parts.peek().is_none() {
            return Some((model, field_name));
        }
        let target = registry.get_by_label(field.related_model()?)?;
        model = target;
    }
    None
}

/// Renders a value the way it reads in a query string or message.
pub fn py_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_mis_db::ModelMeta;
    use axum::http::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_parse_query_keeps_last_value() {
        let params = parse_query(Some("q=a&o=1&q=b%20c"));
        assert_eq!(params, vec![("q".into(), "b c".into()), ("o".into(), "1".into())]);
        assert_eq!(query_get(&params, "o"), Some("1"));
        assert!(parse_query(None).is_empty());
    }

    #[test]
    fn test_get_query_string() {
        let params = parse_query(Some("status=1&created__gte=2024-01-01&created__lt=2024-02-01"));
        assert_eq!(
            get_query_string(&params, &[("status", Some("2"))], &["created__"]),
            "?status=2"
        );
        assert_eq!(get_query_string(&params, &[("status", None)], &["created"]), "?");
        assert_eq!(
            get_query_string(&Vec::new(), &[("b", Some("x y")), ("a", Some("1"))], &[]),
            "?a=1&b=x+y"
        );
    }

    #[test]
    fn test_base_url() {
        let mut headers = HeaderMap::new();
        assert_eq!(base_url(&headers), "http://localhost/");
        headers.insert(header::HOST, HeaderValue::from_static("example.com:8000"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(base_url(&headers), "https://example.com:8000/");
        assert_eq!(absolute_url(&headers, "/media/a.png"), "https://example.com:8000/media/a.png");
    }

    #[test]
    fn test_field_for_path() {
        use admin_mis_db::{FieldDef, FieldType, OnDelete};
        let mut registry = ModelRegistry::new();
        registry.register(
            ModelMeta::new("library", "Author")
                .field(FieldDef::new("name", FieldType::CharField).max_length(20)),
        );
        let book = registry.register(ModelMeta::new("library", "Book").field(FieldDef::new(
            "author",
            FieldType::ForeignKey {
                to: "library.author".into(),
                on_delete: OnDelete::Cascade,
                related_name: None,
            },
        )));
        let (owner, name) = field_for_path(&registry, &book, "author__name").unwrap();
        assert_eq!((owner.model_name.as_str(), name), ("author", "name"));
        let (owner, name) = field_for_path(&registry, &book, "pk").unwrap();
        assert_eq!((owner.model_name.as_str(), name), ("book", "id"));
        assert!(field_for_path(&registry, &book, "author__missing").is_none());
        assert!(field_for_path(&registry, &book, "id__name").is_none());
    }

    #[test]
    fn test_names_and_values() {
        assert_eq!(normalize_name("Django-Admin_Mis"), "django_admin_mis");
        let meta = ModelMeta::new("library", "BookCopy");
        assert_eq!(model_ngettext(&meta, 1), "book copy");
        assert_eq!(model_ngettext(&meta, 2), "book copys");
        assert_eq!(py_str(&json!(true)), "True");
        assert_eq!(py_str(&json!(null)), "None");
        assert_eq!(py_str(&json!(3)), "3");
        assert_eq!(py_str(&json!("x")), "x");
    }
}
