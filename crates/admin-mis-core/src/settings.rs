//! Runtime settings for admin-mis.
//!
//! [`Settings`] holds server, site branding, logging and account
//! configuration. Every field has a default, so a settings file only needs to
//! name what it changes (see [`settings_loader`](crate::settings_loader)).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An API account declared in settings.
///
/// Permissions use the `"app_label.codename"` format (e.g. `"shop.view_order"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub username: String,
    /// Token accepted in `Authorization: Token <key>`.
    pub token: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub permissions: Vec<String>,
    pub groups: Vec<String>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            username: String::new(),
            token: String::new(),
            is_active: true,
            is_staff: true,
            is_superuser: false,
            permissions: Vec::new(),
            groups: Vec::new(),
        }
    }
}

/// A permission group declared in settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupSettings {
    pub name: String,
    pub permissions: Vec<String>,
}

/// Global configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Debug mode switches logging to a human-readable format.
    pub debug: bool,
    /// A `tracing` filter directive, e.g. `"info"` or `"admin_mis_admin=debug"`.
    pub log_level: String,
    pub host: String,
    pub port: u16,
    /// Shown as `site_header` in the index metadata.
    pub site_header: String,
    pub site_title: String,
    pub index_title: String,
    /// Mount point of the admin API.
    pub api_prefix: String,
    /// Prefix for uploaded file URLs.
    pub media_url: String,
    pub users: Vec<UserSettings>,
    pub groups: Vec<GroupSettings>,
    /// Free-form values for application code.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            site_header: "Django administration".to_string(),
            site_title: "Django site admin".to_string(),
            index_title: "Site administration".to_string(),
            api_prefix: "/api/v1/admin".to_string(),
            media_url: "/media/".to_string(),
            users: Vec::new(),
            groups: Vec::new(),
            extra: HashMap::new(),
        }
    }
}

impl Settings {
    /// Returns the socket address string the server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
