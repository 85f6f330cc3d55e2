//! # admin-mis-core
//!
//! Foundation types shared by every admin-mis crate.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Runtime configuration
//! - [`settings_loader`] - TOML and environment loading
//! - [`logging`] - Tracing-based logging integration
//! - [`upload`] - Uploaded file representation

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;
pub mod upload;

pub use error::{MisError, MisResult, ValidationError};
pub use settings::{GroupSettings, Settings, UserSettings};
pub use upload::UploadedFile;
