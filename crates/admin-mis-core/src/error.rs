//! Core error types for admin-mis.
//!
//! [`MisError`] covers request, storage, validation and configuration failures
//! and knows its HTTP status. [`ValidationError`] carries a message template
//! plus the parameters a validator wants interpolated into it.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// A validation failure raised by a field, validator or form.
///
/// Messages may contain `%(name)s` / `%(name)d` placeholders that are filled
/// from `params` by [`ValidationError::render`].
///
/// # Examples
///
/// ```
/// use admin_mis_core::error::ValidationError;
///
/// let err = ValidationError::new(
///     "Ensure this value is less than or equal to %(limit_value)s.",
///     "max_value",
/// )
/// .with_param("limit_value", "200");
/// assert_eq!(err.render(), "Ensure this value is less than or equal to 200.");
/// ```
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The message template.
    pub message: String,
    /// A short code identifying the failure (e.g. "required", "invalid").
    pub code: String,
    /// Values interpolated into the message template.
    pub params: HashMap<String, String>,
    /// Per-field errors, keyed by field name.
    pub field_errors: HashMap<String, Vec<Self>>,
}

impl ValidationError {
    /// Creates a new `ValidationError` with a message and code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            params: HashMap::new(),
            field_errors: HashMap::new(),
        }
    }

    /// Creates a `ValidationError` containing per-field errors.
    pub fn with_field_errors(field_errors: HashMap<String, Vec<Self>>) -> Self {
        Self {
            message: String::new(),
            code: String::new(),
            params: HashMap::new(),
            field_errors,
        }
    }

    /// Adds a parameter to this validation error.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Returns the message with every `%(key)s` / `%(key)d` placeholder replaced.
    pub fn render(&self) -> String {
        let mut out = self.message.clone();
        for (key, value) in &self.params {
            for spec in ['s', 'd', 'r'] {
                out = out.replace(&format!("%({key}){spec}"), value);
            }
        }
        out
    }

    /// Flattens the error into rendered messages keyed by field.
    ///
    /// A plain error (no field errors) is returned under `fallback_field`.
    pub fn message_dict(&self, fallback_field: &str) -> HashMap<String, Vec<String>> {
        let mut out: HashMap<String, Vec<String>> = HashMap::new();
        if !self.message.is_empty() {
            out.entry(fallback_field.to_string())
                .or_default()
                .push(self.render());
        }
        for (field, errors) in &self.field_errors {
            out.entry(field.clone())
                .or_default()
                .extend(errors.iter().map(Self::render));
        }
        out
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            write!(f, "{}", self.render())?;
        } else if !self.field_errors.is_empty() {
            let mut fields: Vec<_> = self.field_errors.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            let mut first = true;
            for (field, errors) in fields {
                for error in errors {
                    if !first {
                        write!(f, "; ")?;
                    }
                    write!(f, "{field}: {error}")?;
                    first = false;
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The primary error type for admin-mis.
///
/// Each variant maps to an HTTP status code via [`MisError::status_code`].
#[derive(Error, Debug)]
pub enum MisError {
    // ── Request errors ───────────────────────────────────────────────

    /// HTTP 400 Bad Request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// HTTP 401 Unauthorized.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// HTTP 403 Forbidden.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// HTTP 404 Not Found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// HTTP 405 Method Not Allowed.
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    // ── Storage errors ───────────────────────────────────────────────

    /// A lookup expected a row that is not there.
    #[error("Object does not exist: {0}")]
    DoesNotExist(String),

    /// A generic storage failure.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A uniqueness or reference constraint was violated.
    #[error("Integrity error: {0}")]
    IntegrityError(String),

    /// Deleting would remove rows referenced through a protecting relation.
    #[error("Protected: {0}")]
    ProtectedError(String),

    // ── Validation ───────────────────────────────────────────────────

    /// One or more fields failed validation.
    #[error("Validation error: {0}")]
    ValidationError(ValidationError),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A registry or admin declaration is inconsistent.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    // ── Serialization / IO ───────────────────────────────────────────

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MisError {
    /// Returns the HTTP status code associated with this error.
    ///
    /// - `BadRequest`, `ValidationError` -> 400
    /// - `Unauthorized` -> 401
    /// - `PermissionDenied`, `ProtectedError` -> 403
    /// - `NotFound`, `DoesNotExist` -> 404
    /// - `MethodNotAllowed` -> 405
    /// - Everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::ValidationError(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::PermissionDenied(_) | Self::ProtectedError(_) => 403,
            Self::NotFound(_) | Self::DoesNotExist(_) => 404,
            Self::MethodNotAllowed(_) => 405,
            Self::DatabaseError(_)
            | Self::IntegrityError(_)
            | Self::ConfigurationError(_)
            | Self::ImproperlyConfigured(_)
            | Self::SerializationError(_)
            | Self::IoError(_) => 500,
        }
    }
}

impl From<serde_json::Error> for MisError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// A convenience type alias for `Result<T, MisError>`.
pub type MisResult<T> = Result<T, MisError>;
