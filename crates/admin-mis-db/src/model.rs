//! Model metadata and the model registry.
//!
//! A [`ModelMeta`] describes one model: its app, names, ordering and fields.
//! The [`ModelRegistry`] is the table of every model known at startup and
//! answers label lookups and reverse-relation queries.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use admin_mis_core::MisError;
use serde_json::Value;

use crate::fields::{FieldDef, FieldType};
use crate::store::Record;

/// Renders a record for display (the model's `__str__`).
pub type DisplayFn = fn(&Record) -> String;

/// Metadata for a single model.
pub struct ModelMeta {
    /// The application label (e.g. "shop").
    pub app_label: String,
    /// The model name in lowercase (e.g. "orderline").
    pub model_name: String,
    /// The model's class-style name (e.g. "OrderLine").
    pub object_name: String,
    pub verbose_name: String,
    pub verbose_name_plural: String,
    /// Default ordering; `-` prefix for descending.
    pub ordering: Vec<String>,
    pub fields: Vec<FieldDef>,
    display: Option<DisplayFn>,
}

impl fmt::Debug for ModelMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelMeta")
            .field("app_label", &self.app_label)
            .field("object_name", &self.object_name)
            .field("fields", &self.fields.len())
            .finish_non_exhaustive()
    }
}

impl ModelMeta {
    /// Creates metadata for `object_name` in `app_label`, with an implicit `id`
    /// primary key.
    pub fn new(app_label: impl Into<String>, object_name: impl Into<String>) -> Self {
        let object_name = object_name.into();
        let verbose_name = camel_case_to_spaces(&object_name);
        Self {
            app_label: app_label.into(),
            model_name: object_name.to_lowercase(),
            verbose_name_plural: format!("{verbose_name}s"),
            verbose_name,
            object_name,
            ordering: Vec::new(),
            fields: vec![FieldDef::auto_id().finalize()],
            display: None,
        }
    }

    /// Adds a field. Declaring a primary key replaces the implicit `id`.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        if field.primary_key {
            self.fields.retain(|f| !(f.auto_created && f.primary_key));
        }
        self.fields.push(field.finalize());
        self
    }

    #[must_use]
    pub fn verbose_name(mut self, name: impl Into<String>) -> Self {
        self.verbose_name = name.into();
        self.verbose_name_plural = format!("{}s", self.verbose_name);
        self
    }

    #[must_use]
    pub fn verbose_name_plural(mut self, name: impl Into<String>) -> Self {
        self.verbose_name_plural = name.into();
        self
    }

    #[must_use]
    pub fn ordering(mut self, ordering: &[&str]) -> Self {
        self.ordering = ordering.iter().map(ToString::to_string).collect();
        self
    }

    /// Sets the `__str__` renderer.
    #[must_use]
    pub fn display(mut self, display: DisplayFn) -> Self {
        self.display = Some(display);
        self
    }

    /// `"app_label.model_name"`.
    pub fn label_lower(&self) -> String {
        format!("{}.{}", self.app_label, self.model_name)
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the primary key field.
    ///
    /// # Panics
    ///
    /// Never in practice: every model carries either a declared or an implicit
    /// primary key.
    pub fn pk(&self) -> &FieldDef {
        self.fields
            .iter()
            .find(|f| f.primary_key)
            .unwrap_or(&self.fields[0])
    }

    pub fn pk_name(&self) -> &'static str {
        self.pk().name
    }

    /// Extracts the integer primary key of a record.
    pub fn pk_of(&self, record: &Record) -> Option<i64> {
        record.get(self.pk_name()).and_then(Value::as_i64)
    }

    /// Renders a record for display.
    pub fn str(&self, record: &Record) -> String {
        match self.display {
            Some(display) => display(record),
            None => format!(
                "{} object ({})",
                self.object_name,
                record.get(self.pk_name()).map_or_else(
                    || "None".to_string(),
                    |v| v.as_i64().map_or_else(|| v.to_string(), |n| n.to_string())
                )
            ),
        }
    }

    /// Fields backed by a column (everything but many-to-many).
    pub fn concrete_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields
            .iter()
            .filter(|f| !matches!(f.field_type, FieldType::ManyToManyField { .. }))
    }
}

/// Converts `"AllfieldModel"` into `"allfield model"`.
pub fn camel_case_to_spaces(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev_lower = chars[i - 1].is_lowercase();
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev_lower || (next_lower && chars[i - 1].is_uppercase()) {
                out.push(' ');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Uppercases the first character.
pub fn capfirst(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// A relation pointing at a model from another model.
#[derive(Debug, Clone)]
pub struct RelatedObject {
    /// The model holding the relation field.
    pub model: Arc<ModelMeta>,
    /// The relation field on `model`.
    pub field_name: &'static str,
    /// Name used from the target side (`related_name` or the model name).
    pub query_name: String,
}

impl RelatedObject {
    pub fn field(&self) -> &FieldDef {
        self.model
            .get_field(self.field_name)
            .unwrap_or_else(|| self.model.pk())
    }
}

#[derive(Debug, Clone)]
struct AppEntry {
    verbose_name: String,
    models: Vec<String>,
}

/// Every model known to the process, keyed by `"app.model"`.
#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    apps: BTreeMap<String, AppEntry>,
    models: BTreeMap<String, Arc<ModelMeta>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an application with a display name.
    pub fn register_app(&mut self, label: &str, verbose_name: impl Into<String>) {
        self.apps
            .entry(label.to_string())
            .or_insert_with(|| AppEntry {
                verbose_name: String::new(),
                models: Vec::new(),
            })
            .verbose_name = verbose_name.into();
    }

    /// Registers a model, declaring its app if needed.
    pub fn register(&mut self, meta: ModelMeta) -> Arc<ModelMeta> {
        let label = meta.label_lower();
        let app = self
            .apps
            .entry(meta.app_label.clone())
            .or_insert_with(|| AppEntry {
                verbose_name: title_case(&meta.app_label),
                models: Vec::new(),
            });
        if !app.models.contains(&meta.model_name) {
            app.models.push(meta.model_name.clone());
        }
        let meta = Arc::new(meta);
        tracing::debug!(model = %label, "registered model");
        self.models.insert(label, Arc::clone(&meta));
        meta
    }

    pub fn get_model(&self, app_label: &str, model_name: &str) -> Option<Arc<ModelMeta>> {
        self.get_by_label(&format!("{app_label}.{model_name}"))
    }

    /// Looks a model up by `"app.model"`.
    pub fn get_by_label(&self, label: &str) -> Option<Arc<ModelMeta>> {
        self.models.get(&label.to_lowercase()).cloned()
    }

    pub fn has_app(&self, app_label: &str) -> bool {
        self.apps.contains_key(app_label)
    }

    pub fn app_verbose_name(&self, app_label: &str) -> Option<&str> {
        self.apps.get(app_label).map(|a| a.verbose_name.as_str())
    }

    /// All models, ordered by label.
    pub fn models(&self) -> impl Iterator<Item = &Arc<ModelMeta>> {
        self.models.values()
    }

    /// Relations on other models that point at `target`.
    pub fn related_objects(&self, target: &ModelMeta) -> Vec<RelatedObject> {
        let target_label = target.label_lower();
        let mut out = Vec::new();
        for model in self.models.values() {
            for field in &model.fields {
                if field.related_model() == Some(target_label.as_str()) {
                    out.push(RelatedObject {
                        model: Arc::clone(model),
                        field_name: field.name,
                        query_name: field.related_query_name(&model.model_name),
                    });
                }
            }
        }
        out
    }

    /// Finds the foreign key on `child` that points at `parent`.
    pub fn fk_to(&self, child: &ModelMeta, parent: &ModelMeta) -> Result<&'static str, MisError> {
        let parent_label = parent.label_lower();
        let candidates: Vec<&FieldDef> = child
            .fields
            .iter()
            .filter(|f| {
                matches!(
                    f.field_type,
                    FieldType::ForeignKey { .. } | FieldType::OneToOneField { .. }
                ) && f.related_model() == Some(parent_label.as_str())
            })
            .collect();
        match candidates.as_slice() {
            [field] => Ok(field.name),
            [] => Err(MisError::ImproperlyConfigured(format!(
                "'{}' has no ForeignKey to '{}'.",
                child.label_lower(),
                parent_label
            ))),
            _ => Err(MisError::ImproperlyConfigured(format!(
                "'{}' has more than one ForeignKey to '{}'.",
                child.label_lower(),
                parent_label
            ))),
        }
    }

    /// Verifies that every relation points at a registered model.
    pub fn check(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for model in self.models.values() {
            for field in &model.fields {
                if let Some(target) = field.related_model() {
                    if !self.models.contains_key(target) {
                        errors.push(format!(
                            "{}.{}: relation to unregistered model '{target}'",
                            model.label_lower(),
                            field.name
                        ));
                    }
                }
            }
        }
        errors
    }
}

fn title_case(label: &str) -> String {
    label
        .split('_')
        .map(capfirst)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::OnDelete;
    use serde_json::json;

    fn customer() -> ModelMeta {
        ModelMeta::new("shop", "Customer")
            .field(FieldDef::new("name", FieldType::CharField).max_length(50))
    }

    fn order() -> ModelMeta {
        ModelMeta::new("shop", "OrderLine").field(FieldDef::new(
            "customer",
            FieldType::ForeignKey {
                to: "shop.customer".into(),
                on_delete: OnDelete::Cascade,
                related_name: Some("lines".into()),
            },
        ))
    }

    #[test]
    fn test_names() {
        let meta = order();
        assert_eq!(meta.model_name, "orderline");
        assert_eq!(meta.verbose_name, "order line");
        assert_eq!(meta.verbose_name_plural, "order lines");
        assert_eq!(meta.label_lower(), "shop.orderline");
    }

    #[test]
    fn test_camel_case_to_spaces() {
        assert_eq!(camel_case_to_spaces("AllfieldModel"), "allfield model");
        assert_eq!(camel_case_to_spaces("Foreign1"), "foreign1");
        assert_eq!(camel_case_to_spaces("HTTPLog"), "http log");
    }

    #[test]
    fn test_implicit_pk_replaced() {
        let meta = ModelMeta::new("shop", "Sku")
            .field(FieldDef::new("code", FieldType::IntegerField).primary_key());
        assert_eq!(meta.pk_name(), "code");
        assert!(meta.get_field("id").is_none());
    }

    #[test]
    fn test_default_str() {
        let meta = customer();
        let record = json!({"id": 3, "name": "x"}).as_object().cloned().unwrap();
        assert_eq!(meta.str(&record), "Customer object (3)");
        let meta = customer().display(|r| r["name"].as_str().unwrap_or_default().to_string());
        assert_eq!(meta.str(&record), "x");
    }

    #[test]
    fn test_registry_related_objects() {
        let mut registry = ModelRegistry::new();
        let customer = registry.register(customer());
        let order = registry.register(order());
        let related = registry.related_objects(&customer);
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].query_name, "lines");
        assert_eq!(registry.fk_to(&order, &customer).unwrap(), "customer");
        assert!(registry.check().is_empty());
        assert_eq!(registry.app_verbose_name("shop"), Some("Shop"));
    }

    #[test]
    fn test_registry_check_dangling_relation() {
        let mut registry = ModelRegistry::new();
        registry.register(order());
        assert_eq!(registry.check().len(), 1);
    }
}
