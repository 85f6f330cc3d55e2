//! Model administration configuration.
//!
//! A [`ModelAdmin`] describes how one model is listed, filtered, searched and
//! edited through the API. Configuration is set with builder methods; the
//! capability methods (`has_*_permission`, [`ModelAdmin::get_fieldsets`],
//! [`ModelAdmin::get_inline_instances`], ...) are what the request handlers
//! call.
//!
//! ```
//! use std::sync::Arc;
//! use admin_mis_admin::model_admin::ModelAdmin;
//! use admin_mis_db::{FieldDef, FieldType, ModelMeta};
//!
//! let article = Arc::new(
//!     ModelMeta::new("blog", "Article")
//!         .field(FieldDef::new("title", FieldType::CharField).max_length(200)),
//! );
//! let admin = ModelAdmin::new(article)
//!     .list_display(vec!["title"])
//!     .search_fields(vec!["title"])
//!     .list_per_page(25);
//! assert_eq!(admin.list_per_page, 25);
//! ```

use std::fmt;
use std::sync::Arc;

use admin_mis_auth::User;
use admin_mis_core::{MisError, MisResult};
use admin_mis_db::{ModelMeta, ModelRegistry, Record};
use admin_mis_forms::formset::DEFAULT_MAX_NUM;
use admin_mis_forms::{ExtraField, FormSetSpec};
use serde_json::Value;

use crate::actions::{ActionRegistry, AdminAction};
use crate::permissions::{model_perms, ModelPermissions, ModelPerms, PermissionPolicy};

/// Computes a list column from a record.
pub type ColumnFn = fn(&Record) -> Value;

/// Configuration for how a model is displayed and managed through the API.
pub struct ModelAdmin {
    pub meta: Arc<ModelMeta>,
    /// Columns of the list view. `"__str__"` renders the record's display.
    pub list_display: Vec<String>,
    pub list_display_links: Vec<String>,
    pub list_filter: Vec<ListFilter>,
    pub search_fields: Vec<String>,
    /// Default ordering for the list view; falls back to the model's.
    pub ordering: Vec<String>,
    pub list_per_page: usize,
    /// A date field for drilling down by year, month and day.
    pub date_hierarchy: Option<String>,
    /// Explicit form fields, used when no fieldsets are given.
    pub fields: Vec<String>,
    pub fieldsets: Vec<Fieldset>,
    pub exclude: Vec<String>,
    pub readonly_fields: Vec<String>,
    pub inlines: Vec<InlineAdmin>,
    /// Form-only fields with no model column.
    pub extra_fields: Vec<ExtraField>,
    /// Computed list columns.
    pub columns: Vec<DisplayColumn>,
    pub actions: ActionRegistry,
    pub policy: Arc<dyn PermissionPolicy>,
}

impl ModelAdmin {
    /// Creates a `ModelAdmin` with default configuration and the built-in
    /// `delete_selected` action.
    pub fn new(meta: Arc<ModelMeta>) -> Self {
        Self {
            meta,
            list_display: vec!["__str__".to_string()],
            list_display_links: Vec::new(),
            list_filter: Vec::new(),
            search_fields: Vec::new(),
            ordering: Vec::new(),
            list_per_page: 100,
            date_hierarchy: None,
            fields: Vec::new(),
            fieldsets: Vec::new(),
            exclude: Vec::new(),
            readonly_fields: Vec::new(),
            inlines: Vec::new(),
            extra_fields: Vec::new(),
            columns: Vec::new(),
            actions: ActionRegistry::new(),
            policy: Arc::new(ModelPermissions),
        }
    }

    #[must_use]
    pub fn list_display(mut self, fields: Vec<&str>) -> Self {
        self.list_display = fields.into_iter().map(String::from).collect();
        self
    }

    #[must_use]
    pub fn list_display_links(mut self, fields: Vec<&str>) -> Self {
        self.list_display_links = fields.into_iter().map(String::from).collect();
        self
    }

    /// Sets the list filters from field paths.
    #[must_use]
    pub fn list_filter_fields(mut self, fields: Vec<&str>) -> Self {
        self.list_filter = fields
            .into_iter()
            .map(|f| ListFilter::Field(f.to_string()))
            .collect();
        self
    }

    #[must_use]
    pub fn list_filter(mut self, filters: Vec<ListFilter>) -> Self {
        self.list_filter = filters;
        self
    }

    #[must_use]
    pub fn search_fields(mut self, fields: Vec<&str>) -> Self {
        self.search_fields = fields.into_iter().map(String::from).collect();
        self
    }

    #[must_use]
    pub fn ordering(mut self, fields: Vec<&str>) -> Self {
        self.ordering = fields.into_iter().map(String::from).collect();
        self
    }

    #[must_use]
    pub const fn list_per_page(mut self, count: usize) -> Self {
        self.list_per_page = count;
        self
    }

    #[must_use]
    pub fn date_hierarchy(mut self, field: &str) -> Self {
        self.date_hierarchy = Some(field.to_string());
        self
    }

    #[must_use]
    pub fn fields(mut self, fields: Vec<&str>) -> Self {
        self.fields = fields.into_iter().map(String::from).collect();
        self
    }

    #[must_use]
    pub fn fieldsets(mut self, fieldsets: Vec<Fieldset>) -> Self {
        self.fieldsets = fieldsets;
        self
    }

    #[must_use]
    pub fn exclude(mut self, fields: Vec<&str>) -> Self {
        self.exclude = fields.into_iter().map(String::from).collect();
        self
    }

    #[must_use]
    pub fn readonly_fields(mut self, fields: Vec<&str>) -> Self {
        self.readonly_fields = fields.into_iter().map(String::from).collect();
        self
    }

    #[must_use]
    pub fn inlines(mut self, inlines: Vec<InlineAdmin>) -> Self {
        self.inlines = inlines;
        self
    }

    #[must_use]
    pub fn extra_field(mut self, field: ExtraField) -> Self {
        self.extra_fields.push(field);
        self
    }

    /// Adds a computed list column, usable in `list_display` by name.
    #[must_use]
    pub fn column(mut self, column: DisplayColumn) -> Self {
        self.columns.push(column);
        self
    }

    #[must_use]
    pub fn action(mut self, action: Box<dyn AdminAction>) -> Self {
        self.actions.register(action);
        self
    }

    /// Removes every action, including `delete_selected`.
    #[must_use]
    pub fn no_actions(mut self) -> Self {
        self.actions = ActionRegistry::empty();
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: Arc<dyn PermissionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the model key in `"app_label.model_name"` format.
    pub fn model_key(&self) -> String {
        self.meta.label_lower()
    }

    /// Resolves every inline's foreign key to its parent.
    ///
    /// # Errors
    ///
    /// Fails when an inline model has no (or more than one) foreign key to
    /// its parent, or a configured `fk_name` is not such a key.
    pub fn resolve_inlines(&mut self, registry: &ModelRegistry) -> MisResult<()> {
        let parent = Arc::clone(&self.meta);
        for inline in &mut self.inlines {
            inline.resolve(registry, &parent)?;
        }
        Ok(())
    }

    // ── Permissions ─────────────────────────────────────────────────

    pub fn has_module_permission(&self, user: &User) -> bool {
        self.policy.has_module_permission(user, &self.meta.app_label)
    }

    pub fn has_view_permission(&self, user: &User, obj: Option<&Record>) -> bool {
        self.policy.has_view_permission(user, &self.meta, obj)
    }

    pub fn has_add_permission(&self, user: &User) -> bool {
        self.policy.has_add_permission(user, &self.meta)
    }

    pub fn has_change_permission(&self, user: &User, obj: Option<&Record>) -> bool {
        self.policy.has_change_permission(user, &self.meta, obj)
    }

    pub fn has_delete_permission(&self, user: &User, obj: Option<&Record>) -> bool {
        self.policy.has_delete_permission(user, &self.meta, obj)
    }

    pub fn get_model_perms(&self, user: &User) -> ModelPerms {
        model_perms(self.policy.as_ref(), user, &self.meta)
    }

    /// Permissions for one record, as attached to detail responses.
    pub fn object_perms(&self, user: &User, obj: &Record) -> ModelPerms {
        ModelPerms {
            add: self.has_add_permission(user),
            change: self.has_change_permission(user, Some(obj)),
            delete: self.has_delete_permission(user, Some(obj)),
            view: self.has_view_permission(user, Some(obj)),
        }
    }

    // ── List view ───────────────────────────────────────────────────

    pub fn get_list_display(&self) -> &[String] {
        &self.list_display
    }

    /// The admin's own ordering (empty when unset).
    pub fn get_ordering(&self) -> &[String] {
        &self.ordering
    }

    pub fn get_column(&self, name: &str) -> Option<&DisplayColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The list filter parameters the changelist accepts: the first path
    /// segment of every filter.
    pub fn filter_roots(&self) -> Vec<String> {
        self.list_filter
            .iter()
            .map(|f| f.parameter().split("__").next().unwrap_or_default().to_string())
            .collect()
    }

    // ── Forms ───────────────────────────────────────────────────────

    pub fn get_readonly_fields(&self) -> &[String] {
        &self.readonly_fields
    }

    /// The form layout. Without configured fieldsets, a single unnamed
    /// fieldset of [`ModelAdmin::get_fields`].
    pub fn get_fieldsets(&self) -> Vec<Fieldset> {
        if self.fieldsets.is_empty() {
            vec![Fieldset {
                name: None,
                fields: self.get_fields(),
                description: None,
            }]
        } else {
            self.fieldsets.clone()
        }
    }

    /// Configured `fields`, else every editable model field not excluded,
    /// then the extra form fields, then the read-only fields.
    pub fn get_fields(&self) -> Vec<String> {
        if !self.fields.is_empty() {
            return self.fields.clone();
        }
        let mut fields: Vec<String> = self
            .meta
            .fields
            .iter()
            .filter(|f| f.editable && !f.auto_created && !self.exclude.iter().any(|e| e == f.name))
            .map(|f| f.name.to_string())
            .collect();
        for extra in &self.extra_fields {
            push_unique(&mut fields, extra.name());
        }
        for name in &self.readonly_fields {
            push_unique(&mut fields, name);
        }
        fields
    }

    /// Model fields the form binds: the flattened fieldsets without
    /// read-only, excluded, non-editable or form-only names.
    pub fn form_fields(&self) -> Vec<String> {
        flatten_fieldsets(&self.get_fieldsets())
            .into_iter()
            .filter(|name| {
                !self.readonly_fields.contains(name)
                    && !self.exclude.contains(name)
                    && self
                        .meta
                        .get_field(name)
                        .is_some_and(|f| f.editable && !f.primary_key)
            })
            .collect()
    }

    // ── Inlines ─────────────────────────────────────────────────────

    /// The inlines `user` may see, with their permissions resolved.
    ///
    /// An inline with no permission at all is skipped; without add
    /// permission no new rows may be submitted.
    pub fn get_inline_instances(&self, user: &User) -> Vec<InlineInstance<'_>> {
        inline_instances(&self.inlines, user)
    }
}

impl fmt::Debug for ModelAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelAdmin")
            .field("model", &self.meta.label_lower())
            .field("list_display", &self.list_display)
            .field("inlines", &self.inlines.len())
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}

fn push_unique(fields: &mut Vec<String>, name: &str) {
    if !fields.iter().any(|f| f == name) {
        fields.push(name.to_string());
    }
}

/// Field names of every fieldset, in order.
pub fn flatten_fieldsets(fieldsets: &[Fieldset]) -> Vec<String> {
    let mut out = Vec::new();
    for fieldset in fieldsets {
        for name in &fieldset.fields {
            push_unique(&mut out, name);
        }
    }
    out
}

/// A named group of form fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fieldset {
    pub name: Option<String>,
    pub fields: Vec<String>,
    pub description: Option<String>,
}

impl Fieldset {
    pub fn new(fields: Vec<&str>) -> Self {
        Self {
            name: None,
            fields: fields.into_iter().map(String::from).collect(),
            description: None,
        }
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }
}

/// A computed list column.
#[derive(Clone)]
pub struct DisplayColumn {
    pub name: String,
    /// Field used when sorting by this column.
    pub admin_order_field: Option<String>,
    func: ColumnFn,
}

impl DisplayColumn {
    pub fn new(name: &str, func: ColumnFn) -> Self {
        Self {
            name: name.to_string(),
            admin_order_field: None,
            func,
        }
    }

    #[must_use]
    pub fn order_field(mut self, field: &str) -> Self {
        self.admin_order_field = Some(field.to_string());
        self
    }

    pub fn value(&self, record: &Record) -> Value {
        (self.func)(record)
    }
}

impl fmt::Debug for DisplayColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayColumn")
            .field("name", &self.name)
            .field("admin_order_field", &self.admin_order_field)
            .finish_non_exhaustive()
    }
}

/// A filter of the list view.
#[derive(Debug, Clone)]
pub enum ListFilter {
    /// Filter on a field path; the filter kind follows the field type.
    Field(String),
    /// A filter with fixed choices and its own matching rule.
    Simple(SimpleListFilter),
}

impl ListFilter {
    /// The query parameter (or field path) the filter reads.
    pub fn parameter(&self) -> &str {
        match self {
            Self::Field(path) => path,
            Self::Simple(filter) => &filter.parameter_name,
        }
    }
}

/// Decides whether a record matches the selected filter value.
pub type FilterFn = fn(&str, &Record) -> bool;

/// A filter with explicit `(value, label)` choices.
#[derive(Clone)]
pub struct SimpleListFilter {
    pub title: String,
    pub parameter_name: String,
    pub lookups: Vec<(String, String)>,
    pub queryset: FilterFn,
}

impl SimpleListFilter {
    pub fn new(title: &str, parameter_name: &str, queryset: FilterFn) -> Self {
        Self {
            title: title.to_string(),
            parameter_name: parameter_name.to_string(),
            lookups: Vec::new(),
            queryset,
        }
    }

    #[must_use]
    pub fn lookup(mut self, value: &str, label: &str) -> Self {
        self.lookups.push((value.to_string(), label.to_string()));
        self
    }
}

impl fmt::Debug for SimpleListFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleListFilter")
            .field("parameter_name", &self.parameter_name)
            .field("lookups", &self.lookups)
            .finish_non_exhaustive()
    }
}

/// Configuration for editing a child model inside its parent's form.
pub struct InlineAdmin {
    pub model: Arc<ModelMeta>,
    /// Foreign key to the parent; found automatically when unset.
    pub fk_name: Option<&'static str>,
    pub extra: usize,
    pub min_num: Option<usize>,
    pub max_num: Option<usize>,
    pub fields: Vec<String>,
    pub readonly_fields: Vec<String>,
    pub can_delete: bool,
    /// Inlines nested inside each row.
    pub inlines: Vec<InlineAdmin>,
    pub policy: Arc<dyn PermissionPolicy>,
    parent: Option<Arc<ModelMeta>>,
}

impl InlineAdmin {
    pub fn new(model: Arc<ModelMeta>) -> Self {
        Self {
            model,
            fk_name: None,
            extra: 3,
            min_num: None,
            max_num: None,
            fields: Vec::new(),
            readonly_fields: Vec::new(),
            can_delete: true,
            inlines: Vec::new(),
            policy: Arc::new(ModelPermissions),
            parent: None,
        }
    }

    #[must_use]
    pub const fn fk_name(mut self, name: &'static str) -> Self {
        self.fk_name = Some(name);
        self
    }

    #[must_use]
    pub const fn extra(mut self, n: usize) -> Self {
        self.extra = n;
        self
    }

    #[must_use]
    pub const fn min_num(mut self, n: usize) -> Self {
        self.min_num = Some(n);
        self
    }

    #[must_use]
    pub const fn max_num(mut self, n: usize) -> Self {
        self.max_num = Some(n);
        self
    }

    #[must_use]
    pub fn fields(mut self, fields: Vec<&str>) -> Self {
        self.fields = fields.into_iter().map(String::from).collect();
        self
    }

    #[must_use]
    pub fn readonly_fields(mut self, fields: Vec<&str>) -> Self {
        self.readonly_fields = fields.into_iter().map(String::from).collect();
        self
    }

    #[must_use]
    pub const fn can_delete(mut self, can_delete: bool) -> Self {
        self.can_delete = can_delete;
        self
    }

    #[must_use]
    pub fn inlines(mut self, inlines: Vec<Self>) -> Self {
        self.inlines = inlines;
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: Arc<dyn PermissionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// The model this inline is edited under, once resolved.
    pub fn parent_model(&self) -> Option<&Arc<ModelMeta>> {
        self.parent.as_ref()
    }

    fn resolve(&mut self, registry: &ModelRegistry, parent: &Arc<ModelMeta>) -> MisResult<()> {
        let fk = match self.fk_name {
            Some(name) => {
                let target = self.model.get_field(name).and_then(|f| f.related_model());
                if target != Some(parent.label_lower().as_str()) {
                    return Err(MisError::ImproperlyConfigured(format!(
                        "fk_name '{name}' is not a ForeignKey to '{}'.",
                        parent.label_lower()
                    )));
                }
                name
            }
            None => registry.fk_to(&self.model, parent)?,
        };
        self.fk_name = Some(fk);
        self.parent = Some(Arc::clone(parent));
        let me = Arc::clone(&self.model);
        for child in &mut self.inlines {
            child.resolve(registry, &me)?;
        }
        Ok(())
    }

    /// The foreign key back to the parent. Empty until resolved.
    pub fn fk(&self) -> &'static str {
        self.fk_name.unwrap_or_default()
    }

    /// Editable row fields, without read-only ones.
    pub fn form_fields(&self) -> Vec<String> {
        let fk = self.fk();
        let candidates: Vec<String> = if self.fields.is_empty() {
            self.model.fields.iter().map(|f| f.name.to_string()).collect()
        } else {
            self.fields.clone()
        };
        candidates
            .into_iter()
            .filter(|name| {
                name != fk
                    && !self.readonly_fields.contains(name)
                    && self
                        .model
                        .get_field(name)
                        .is_some_and(|f| f.editable && !f.primary_key)
            })
            .collect()
    }

    pub fn get_model_perms(&self, user: &User) -> ModelPerms {
        model_perms(self.policy.as_ref(), user, &self.model)
    }

    pub fn object_perms(&self, user: &User, obj: &Record) -> ModelPerms {
        ModelPerms {
            add: self.policy.has_add_permission(user, &self.model),
            change: self.policy.has_change_permission(user, &self.model, Some(obj)),
            delete: self.policy.has_delete_permission(user, &self.model, Some(obj)),
            view: self.policy.has_view_permission(user, &self.model, Some(obj)),
        }
    }
}

impl fmt::Debug for InlineAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InlineAdmin")
            .field("model", &self.model.label_lower())
            .field("fk_name", &self.fk_name)
            .field("extra", &self.extra)
            .field("inlines", &self.inlines)
            .finish_non_exhaustive()
    }
}

/// An inline as seen by one user.
#[derive(Debug)]
pub struct InlineInstance<'a> {
    pub admin: &'a InlineAdmin,
    pub perms: ModelPerms,
    /// `Some(0)` when the user may not add rows.
    pub max_num: Option<usize>,
    pub children: Vec<InlineInstance<'a>>,
}

impl InlineInstance<'_> {
    pub fn model(&self) -> &Arc<ModelMeta> {
        &self.admin.model
    }

    /// The formset specification for this inline and its nested inlines.
    pub fn formset_spec(&self) -> FormSetSpec {
        let admin = self.admin;
        let mut spec = FormSetSpec::new(Arc::clone(&admin.model), admin.fk())
            .fields(&admin.form_fields())
            .counts(
                admin.extra,
                admin.min_num.unwrap_or(0),
                self.max_num.unwrap_or(DEFAULT_MAX_NUM),
            )
            .permissions(
                self.perms.add,
                self.perms.change,
                admin.can_delete && self.perms.delete,
            );
        for child in &self.children {
            spec = spec.child(child.formset_spec());
        }
        spec
    }
}

fn inline_instances<'a>(inlines: &'a [InlineAdmin], user: &User) -> Vec<InlineInstance<'a>> {
    inlines
        .iter()
        .filter_map(|admin| {
            let perms = admin.get_model_perms(user);
            if !perms.any() {
                return None;
            }
            let max_num = if perms.add { admin.max_num } else { Some(0) };
            Some(InlineInstance {
                admin,
                perms,
                max_num,
                children: inline_instances(&admin.inlines, user),
            })
        })
        .collect()
}
