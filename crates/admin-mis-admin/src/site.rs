//! Admin site registry and router generation.
//!
//! The [`AdminSite`] maps `(app, model)` pairs to their [`ModelAdmin`]
//! configurations and produces the Axum router serving the admin API under
//! the configured prefix (`/api/v1/admin` by default).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use admin_mis_auth::{AuthBackend, TokenBackend, User};
use admin_mis_core::logging::request_span;
use admin_mis_core::{MisError, MisResult, Settings};
use admin_mis_db::{FieldType, ModelRegistry, Store};
use axum::body::Body;
use axum::http::{header, HeaderMap, Request};
use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::error::{ApiError, ApiResult};
use crate::log_entry::{InMemoryLogEntryStore, LogEntryStore};
use crate::model_admin::{ListFilter, ModelAdmin};
use crate::utils::{absolute_url, field_for_path, normalize_name};
use crate::views;

/// The admin site: registered model admins plus the shared services the
/// handlers use.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use admin_mis_admin::model_admin::ModelAdmin;
/// use admin_mis_admin::site::AdminSite;
/// use admin_mis_core::Settings;
/// use admin_mis_db::{FieldDef, FieldType, ModelMeta, ModelRegistry, Store};
///
/// let mut registry = ModelRegistry::new();
/// let article = registry.register(
///     ModelMeta::new("blog", "Article")
///         .field(FieldDef::new("title", FieldType::CharField).max_length(200)),
/// );
/// let store = Store::new(Arc::new(registry));
/// let mut site = AdminSite::new(Settings::default(), store);
/// site.register(ModelAdmin::new(article)).unwrap();
/// assert!(site.is_registered("blog.article"));
/// let _router = site.into_router();
/// ```
pub struct AdminSite {
    settings: Settings,
    store: Store,
    admins: HashMap<String, ModelAdmin>,
    backend: Arc<dyn AuthBackend>,
    log_store: Arc<dyn LogEntryStore>,
}

impl AdminSite {
    /// Creates a site authenticating the users declared in `settings`.
    pub fn new(settings: Settings, store: Store) -> Self {
        let backend = Arc::new(TokenBackend::from_settings(&settings));
        Self {
            settings,
            store,
            admins: HashMap::new(),
            backend,
            log_store: Arc::new(InMemoryLogEntryStore::new()),
        }
    }

    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn AuthBackend>) -> Self {
        self.backend = backend;
        self
    }

    #[must_use]
    pub fn with_log_store(mut self, log_store: Arc<dyn LogEntryStore>) -> Self {
        self.log_store = log_store;
        self
    }

    /// Registers a model admin and resolves its inlines.
    ///
    /// # Errors
    ///
    /// Returns [`MisError::ImproperlyConfigured`] when the model is already
    /// registered, is missing from the model registry, or an inline has no
    /// usable foreign key to its parent.
    pub fn register(&mut self, mut admin: ModelAdmin) -> MisResult<()> {
        let key = admin.model_key();
        if self.admins.contains_key(&key) {
            return Err(MisError::ImproperlyConfigured(format!(
                "The model {} is already registered.",
                admin.meta.object_name
            )));
        }
        if self.registry().get_by_label(&key).is_none() {
            return Err(MisError::ImproperlyConfigured(format!(
                "The model {key} is not in the model registry."
            )));
        }
        admin.resolve_inlines(self.store.registry())?;
        tracing::debug!(model = %key, "registered model admin");
        self.admins.insert(key, admin);
        Ok(())
    }

    pub fn unregister(&mut self, model_key: &str) -> Option<ModelAdmin> {
        self.admins.remove(model_key)
    }

    pub fn is_registered(&self, model_key: &str) -> bool {
        self.admins.contains_key(model_key)
    }

    /// The admin registered for `"app_label.model_name"`.
    pub fn get_admin(&self, model_key: &str) -> Option<&ModelAdmin> {
        self.admins.get(model_key)
    }

    /// Registered admins ordered by model label.
    pub fn admins(&self) -> Vec<&ModelAdmin> {
        let mut admins: Vec<&ModelAdmin> = self.admins.values().collect();
        admins.sort_by_key(|a| a.model_key());
        admins
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    pub const fn store(&self) -> &Store {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        self.store.registry()
    }

    pub fn log_store(&self) -> &Arc<dyn LogEntryStore> {
        &self.log_store
    }

    /// Resolves the admin for URL segments. Names are matched
    /// case-insensitively with `-` read as `_`.
    ///
    /// # Errors
    ///
    /// 400 `"Model does not exist."` for an unknown model and
    /// `"Admin register does not exist."` for one without an admin.
    pub fn resolve(&self, app: &str, model: &str) -> ApiResult<&ModelAdmin> {
        let (app, model) = (normalize_name(app), normalize_name(model));
        let meta = self
            .registry()
            .get_model(&app, &model)
            .ok_or_else(|| ApiError::message("Model does not exist."))?;
        self.get_admin(&meta.label_lower())
            .ok_or_else(|| ApiError::message("Admin register does not exist."))
    }

    /// Authenticates the request from its `Authorization` header.
    ///
    /// # Errors
    ///
    /// 401 when the credentials are missing or unknown.
    pub async fn authenticate(&self, headers: &HeaderMap) -> ApiResult<User> {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        Ok(self.backend.authenticate(authorization).await?)
    }

    /// Absolute URL of the API root, ending in `/`.
    pub fn api_root(&self, headers: &HeaderMap) -> String {
        format!(
            "{}/",
            absolute_url(headers, self.settings.api_prefix.trim_end_matches('/'))
        )
    }

    /// Absolute URL files are served under.
    pub fn media_base(&self, headers: &HeaderMap) -> String {
        absolute_url(headers, &self.settings.media_url)
    }

    /// Validates every admin's configuration against its model. Returns one
    /// message per problem.
    pub fn check(&self) -> Vec<String> {
        let registry = self.registry();
        let mut problems = registry.check();
        for admin in self.admins() {
            let key = admin.model_key();
            let meta = &admin.meta;
            for column in admin.get_list_display() {
                let known = column == "__str__"
                    || admin.get_column(column).is_some()
                    || meta.get_field(column).is_some();
                if !known {
                    problems.push(format!(
                        "{key}: list_display refers to '{column}', which is not a field or column."
                    ));
                }
            }
            for filter in &admin.list_filter {
                if let ListFilter::Field(path) = filter {
                    if field_for_path(registry, meta, path).is_none() {
                        problems.push(format!(
                            "{key}: list_filter refers to '{path}', \
                             which does not refer to a field."
                        ));
                    }
                }
            }
            for search in &admin.search_fields {
                let path = search.trim_start_matches(['^', '=', '@']);
                let root = path.split("__").next().unwrap_or_default();
                if meta.get_field(root).is_none() {
                    problems.push(format!(
                        "{key}: search_fields refers to '{path}', which is not a field."
                    ));
                }
            }
            if let Some(field) = &admin.date_hierarchy {
                let is_date = field_for_path(registry, meta, field)
                    .and_then(|(owner, name)| {
                        owner.get_field(name).map(|f| {
                            matches!(f.field_type, FieldType::DateField | FieldType::DateTimeField)
                        })
                    })
                    .unwrap_or(false);
                if !is_date {
                    problems.push(format!(
                        "{key}: date_hierarchy refers to '{field}', which is not a DateField or \
                         DateTimeField."
                    ));
                }
            }
            for name in admin.get_readonly_fields() {
                let known = meta.get_field(name).is_some()
                    || admin.get_column(name).is_some()
                    || admin.extra_fields.iter().any(|e| e.name() == name);
                if !known {
                    problems.push(format!(
                        "{key}: readonly_fields refers to '{name}', which is not a field."
                    ));
                }
            }
        }
        problems
    }

    /// Builds the router for every admin API endpoint.
    ///
    /// Routes, relative to the API prefix:
    ///
    /// - `GET /` - apps, models and permissions
    /// - `GET /{app}/{model}/` - the change list
    /// - `GET /{app}/{model}/filters` - filters, ordering, search and actions
    /// - `GET /{app}/{model}/fields` - form field descriptors and inlines
    /// - `POST /{app}/{model}/add` - create a record
    /// - `POST /{app}/{model}/action` - run a bulk action
    /// - `GET /{app}/{model}/{id}` - one record with its inline children
    /// - `PATCH /{app}/{model}/{id}/change` - update a record
    /// - `DELETE /{app}/{model}/{ids}/delete-summary` - what a delete would remove
    /// - `DELETE /{app}/{model}/{ids}/delete` - delete records
    pub fn into_router(self) -> Router {
        let prefix = self.settings.api_prefix.trim_end_matches('/').to_string();
        let route = |path: &str| format!("{prefix}{path}");
        let shared = Arc::new(self);

        Router::new()
            .route(&route("/"), get(views::index))
            .route(&route("/{app}/{model}/"), get(views::changelist))
            .route(&route("/{app}/{model}/filters"), get(views::filters))
            .route(&route("/{app}/{model}/fields"), get(views::fields))
            .route(&route("/{app}/{model}/add"), post(views::create))
            .route(&route("/{app}/{model}/action"), post(views::action))
            .route(&route("/{app}/{model}/{id}"), get(views::detail))
            .route(&route("/{app}/{model}/{id}/change"), patch(views::change))
            .route(
                &route("/{app}/{model}/{ids}/delete-summary"),
                delete(views::delete_summary),
            )
            .route(&route("/{app}/{model}/{ids}/delete"), delete(views::delete_objects))
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                let id = uuid::Uuid::new_v4().to_string();
                request_span(&id, req.method().as_str(), req.uri().path())
            }))
            .with_state(shared)
    }
}

impl fmt::Debug for AdminSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut models: Vec<&str> = self.admins.keys().map(String::as_str).collect();
        models.sort_unstable();
        f.debug_struct("AdminSite")
            .field("api_prefix", &self.settings.api_prefix)
            .field("models", &models)
            .finish_non_exhaustive()
    }
}
