//! # admin-mis-admin
//!
//! The generic admin REST API. Models registered with an [`AdminSite`]
//! through a [`ModelAdmin`] configuration are listed, filtered, described,
//! read, written, deleted and acted upon through one uniform JSON contract.
//!
//! ## Modules
//!
//! - [`site`] - The [`AdminSite`] registry and its router
//! - [`views`] - Request handlers
//! - [`model_admin`] - Per-model admin configuration and inlines
//! - [`permissions`] - Method to permission mapping and policies
//! - [`changelist`] - Filtering, search, ordering and pagination of rows
//! - [`filters`] - List filter descriptions
//! - [`date_hierarchy`] - Date drill-down navigation
//! - [`meta`] - Form field descriptors
//! - [`serializer`] - Record serialization
//! - [`inlines`] - Inline children in detail responses
//! - [`actions`] - Bulk actions
//! - [`deleted_objects`] - Delete previews and permission checks
//! - [`messages`] - User-facing messages
//! - [`log_entry`] - The admin change log
//! - [`error`] - The API error type
//! - [`utils`] - Shared helpers

// - module_name_repetitions: ModelAdmin / AdminSite read better than Model / Site
// - significant_drop_tightening: handlers hold the table guard for the whole response
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::significant_drop_tightening)]

pub mod actions;
pub mod changelist;
pub mod date_hierarchy;
pub mod deleted_objects;
pub mod error;
pub mod filters;
pub mod inlines;
pub mod log_entry;
pub mod messages;
pub mod meta;
pub mod model_admin;
pub mod permissions;
pub mod serializer;
pub mod site;
pub mod utils;
pub mod views;

pub use actions::{AdminAction, FnAction};
pub use error::{ApiError, ApiResult};
pub use log_entry::{InMemoryLogEntryStore, LogEntry, LogEntryStore};
pub use model_admin::{
    DisplayColumn, Fieldset, InlineAdmin, ListFilter, ModelAdmin, SimpleListFilter,
};
pub use permissions::{ModelPerms, PermissionKind, PermissionPolicy};
pub use site::AdminSite;
