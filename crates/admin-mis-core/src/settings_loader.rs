//! Settings loading from TOML files and the environment.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `ADMIN_MIS_DEBUG` | `debug` |
//! | `ADMIN_MIS_LOG_LEVEL` | `log_level` |
//! | `ADMIN_MIS_HOST` | `host` |
//! | `ADMIN_MIS_PORT` | `port` |
//! | `ADMIN_MIS_SITE_HEADER` | `site_header` |
//! | `ADMIN_MIS_SITE_TITLE` | `site_title` |
//! | `ADMIN_MIS_INDEX_TITLE` | `index_title` |
//! | `ADMIN_MIS_API_PREFIX` | `api_prefix` |
//!
//! ```rust,no_run
//! use admin_mis_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("admin-mis.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::MisError;
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// The TOML is converted to JSON and deep-merged over the serialized
/// defaults, so unspecified keys keep their default values.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, MisError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| MisError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        MisError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, toml_to_json(toml_value));
    serde_json::from_value(merged).map_err(|e| {
        MisError::ConfigurationError(format!("Failed to deserialize settings from TOML: {e}"))
    })
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, MisError> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        MisError::ConfigurationError(format!(
            "Failed to read TOML file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, MisError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `ADMIN_MIS_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides(settings, |key| std::env::var(key).ok());
}

fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("ADMIN_MIS_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }
    if let Some(val) = lookup("ADMIN_MIS_LOG_LEVEL") {
        settings.log_level = val;
    }
    if let Some(val) = lookup("ADMIN_MIS_HOST") {
        settings.host = val;
    }
    if let Some(val) = lookup("ADMIN_MIS_PORT") {
        match val.parse::<u16>() {
            Ok(port) => settings.port = port,
            Err(_) => tracing::warn!(value = %val, "ignoring invalid ADMIN_MIS_PORT"),
        }
    }
    if let Some(val) = lookup("ADMIN_MIS_SITE_HEADER") {
        settings.site_header = val;
    }
    if let Some(val) = lookup("ADMIN_MIS_SITE_TITLE") {
        settings.site_title = val;
    }
    if let Some(val) = lookup("ADMIN_MIS_INDEX_TITLE") {
        settings.index_title = val;
    }
    if let Some(val) = lookup("ADMIN_MIS_API_PREFIX") {
        settings.api_prefix = val;
    }
}

// ============================================================
// Helpers
// ============================================================

fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = match base_map.remove(&key) {
                    Some(base_v) => merge_json(base_v, override_v),
                    None => override_v,
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
