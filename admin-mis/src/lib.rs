//! # admin-mis
//!
//! A generic REST API over an admin-site registry.
//!
//! This meta-crate re-exports the workspace crates. Depend on it for the
//! whole stack, or on the individual crates for finer-grained control.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use admin_mis::prelude::*;
//!
//! # async fn run() -> Result<(), MisError> {
//! let mut registry = ModelRegistry::new();
//! let article = registry.register(
//!     ModelMeta::new("blog", "Article")
//!         .field(FieldDef::new("title", FieldType::CharField).max_length(200)),
//! );
//! let mut site = AdminSite::new(Settings::default(), Store::new(Arc::new(registry)));
//! site.register(ModelAdmin::new(article).list_display(vec!["__str__", "title"]))?;
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//! axum::serve(listener, site.into_router()).await?;
//! # Ok(())
//! # }
//! ```

/// Error types, settings, the settings loader and logging setup.
pub use admin_mis_core as core;

/// Field definitions, validators, the model registry and the in-memory store.
pub use admin_mis_db as db;

/// Users, groups, permissions and the token backend.
pub use admin_mis_auth as auth;

/// Form data, field cleaning, model forms and inline formsets.
pub use admin_mis_forms as forms;

/// Model admins, the admin site and its HTTP API.
pub use admin_mis_admin as admin;

/// The `admin-mis` command framework and the demo app.
#[cfg(feature = "cli")]
pub use admin_mis_cli as cli;

/// `TestClient` for driving the router in tests.
#[cfg(feature = "testing")]
pub use admin_mis_test as test;

pub use axum;
pub use serde_json;
pub use tokio;
pub use tracing;

/// The types most applications need.
pub mod prelude {
    pub use admin_mis_admin::{
        AdminAction, AdminSite, DisplayColumn, FnAction, InlineAdmin, ListFilter, ModelAdmin,
        PermissionKind, PermissionPolicy, SimpleListFilter,
    };
    pub use admin_mis_auth::{AuthBackend, TokenBackend, User};
    pub use admin_mis_core::{MisError, MisResult, Settings};
    pub use admin_mis_db::{
        FieldDef, FieldType, GeometryType, ModelMeta, ModelRegistry, OnDelete, Store,
    };
}
