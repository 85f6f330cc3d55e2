//! Submitted form data.
//!
//! [`FormData`] is a flat multi-value map of strings plus uploaded files,
//! the shape a `multipart/form-data` or urlencoded body arrives in. JSON
//! bodies are flattened into the same shape so that one cleaning path serves
//! every content type.

use std::collections::{BTreeMap, BTreeSet};

use admin_mis_core::UploadedFile;
use serde_json::Value;

/// Bound form input: string values keyed by field name, plus files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    values: BTreeMap<String, Vec<String>>,
    /// Keys that were submitted as a JSON array, even with one element.
    lists: BTreeSet<String>,
    files: BTreeMap<String, UploadedFile>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flattens a JSON object body.
    ///
    /// Arrays become multi-valued keys, nested objects are kept as their JSON
    /// text, `null` becomes the empty string, and other scalars their string
    /// form. A non-object body yields empty data.
    pub fn from_json(body: &Value) -> Self {
        let mut data = Self::new();
        let Value::Object(map) = body else {
            return data;
        };
        for (key, value) in map {
            match value {
                Value::Array(items) => {
                    data.lists.insert(key.clone());
                    data.values
                        .insert(key.clone(), items.iter().map(scalar_text).collect());
                }
                other => data.append(key.clone(), scalar_text(other)),
            }
        }
        data
    }

    /// Parses an `application/x-www-form-urlencoded` body.
    pub fn from_urlencoded(body: &[u8]) -> Self {
        let mut data = Self::new();
        for (key, value) in url::form_urlencoded::parse(body) {
            data.append(key.into_owned(), value.into_owned());
        }
        data
    }

    /// Adds a value, keeping earlier values for the same key.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    /// Sets a single value, replacing earlier ones.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), vec![value.into()]);
    }

    pub fn add_file(&mut self, key: impl Into<String>, file: UploadedFile) {
        self.files.insert(key.into(), file);
    }

    /// The last value submitted for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|v| v.last())
            .map(String::as_str)
    }

    /// Every value submitted for `key`.
    pub fn get_list(&self, key: &str) -> &[String] {
        self.values.get(key).map_or(&[][..], Vec::as_slice)
    }

    /// Whether `key` arrived as an explicit list.
    pub fn is_list(&self, key: &str) -> bool {
        self.lists.contains(key) || self.get_list(key).len() > 1
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key) || self.files.contains_key(key)
    }

    pub fn file(&self, key: &str) -> Option<&UploadedFile> {
        self.files.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values
            .keys()
            .chain(self.files.keys())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.files.is_empty()
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
