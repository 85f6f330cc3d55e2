//! The `check` command.
//!
//! Validates the demo site's model admins and settings without serving.

use admin_mis_admin::AdminSite;
use admin_mis_core::{MisError, Settings};
use async_trait::async_trait;

use crate::command::ManagementCommand;
use crate::demo;

/// Reports configuration problems and fails when any is an error.
pub struct CheckCommand;

/// One finding of [`run_checks`].
#[derive(Debug, Clone)]
pub struct CheckMessage {
    pub level: CheckLevel,
    pub msg: String,
    pub hint: Option<String>,
    /// Stable identifier, e.g. `admin.E001`.
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl std::fmt::Display for CheckMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: ({}) {}", self.level, self.id, self.msg)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n\tHINT: {hint}")?;
        }
        Ok(())
    }
}

/// Checks the site's admin configuration and the settings it runs with.
pub fn run_checks(site: &AdminSite) -> Vec<CheckMessage> {
    let mut messages: Vec<CheckMessage> = site
        .check()
        .into_iter()
        .map(|msg| CheckMessage {
            level: CheckLevel::Error,
            msg,
            hint: None,
            id: "admin.E001".to_string(),
        })
        .collect();

    let settings = site.settings();
    if !settings.api_prefix.starts_with('/') || settings.api_prefix.ends_with('/') {
        messages.push(CheckMessage {
            level: CheckLevel::Error,
            msg: format!("api_prefix {:?} is not a rooted path", settings.api_prefix),
            hint: Some("Use a value like \"/api/v1/admin\" without a trailing slash".to_string()),
            id: "settings.E001".to_string(),
        });
    }
    if settings.users.is_empty() {
        messages.push(CheckMessage {
            level: CheckLevel::Warning,
            msg: "No users are configured".to_string(),
            hint: Some("Add [[users]] entries with a token to authenticate requests".to_string()),
            id: "auth.W001".to_string(),
        });
    }
    for user in settings.users.iter().filter(|u| u.token.is_empty()) {
        messages.push(CheckMessage {
            level: CheckLevel::Warning,
            msg: format!("User {:?} has no token and cannot authenticate", user.username),
            hint: None,
            id: "auth.W002".to_string(),
        });
    }
    messages
}

#[async_trait]
impl ManagementCommand for CheckCommand {
    fn name(&self) -> &'static str {
        "check"
    }

    fn help(&self) -> &'static str {
        "Validate the admin configuration"
    }

    async fn handle(
        &self,
        _matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), MisError> {
        let site = demo::site(settings.clone())?;
        let messages = run_checks(&site);
        for message in &messages {
            println!("{message}");
        }
        let errors = messages.iter().filter(|m| m.level >= CheckLevel::Error).count();
        if errors > 0 {
            return Err(MisError::ImproperlyConfigured(format!(
                "System check identified {errors} error(s)."
            )));
        }
        println!("System check identified no issues (0 silenced).");
        Ok(())
    }
}
