//! Model-backed forms.
//!
//! A [`ModelForm`] binds submitted [`FormData`] to a subset of a model's
//! fields, optionally on top of an existing record. Validation cleans every
//! field, checks uniqueness against the stored rows, and records which fields
//! differ from the instance. [`ModelForm::save`] writes the result back.

use std::collections::BTreeMap;
use std::sync::Arc;

use admin_mis_core::{MisResult, ValidationError};
use admin_mis_db::fields::{loose_eq, FieldDef, FieldType};
use admin_mis_db::model::{capfirst, ModelMeta};
use admin_mis_db::query::QueryContext;
use admin_mis_db::store::{Record, Tables};
use serde_json::{json, Value};

use crate::data::FormData;
use crate::fields::clean_field;

/// Errors not tied to a single field are reported under this key.
pub const NON_FIELD_ERRORS: &str = "__all__";

/// A form field with no model column behind it.
///
/// Its cleaned value is available in [`ModelForm::cleaned_data`] but never
/// stored.
#[derive(Debug)]
pub struct ExtraField {
    pub def: FieldDef,
    pub label: String,
    /// HTML input type reported to clients (e.g. `"password"`).
    pub input_type: Option<&'static str>,
}

impl ExtraField {
    pub fn new(def: FieldDef) -> Self {
        let def = def.finalize();
        Self {
            label: capfirst(&def.verbose_name),
            def,
            input_type: None,
        }
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub const fn input_type(mut self, input_type: &'static str) -> Self {
        self.input_type = Some(input_type);
        self
    }

    pub fn name(&self) -> &'static str {
        self.def.name
    }

    pub const fn required(&self) -> bool {
        !self.def.blank && !matches!(self.def.field_type, FieldType::BooleanField)
    }
}

/// A form over a model's fields.
#[derive(Debug)]
pub struct ModelForm<'a> {
    meta: Arc<ModelMeta>,
    fields: Vec<String>,
    extra_fields: &'a [ExtraField],
    data: &'a FormData,
    instance: Option<Record>,
    prefix: Option<String>,
    cleaned_data: Record,
    errors: BTreeMap<String, Vec<String>>,
    changed_data: Vec<String>,
}

impl<'a> ModelForm<'a> {
    /// Creates a form over `fields` of `meta`.
    ///
    /// Names that are neither editable model fields nor extra fields are
    /// dropped.
    pub fn new(meta: Arc<ModelMeta>, fields: &[String], data: &'a FormData) -> Self {
        let fields = fields
            .iter()
            .filter(|name| meta.get_field(name).is_some_and(|f| f.editable))
            .cloned()
            .collect();
        Self {
            meta,
            fields,
            extra_fields: &[],
            data,
            instance: None,
            prefix: None,
            cleaned_data: Record::new(),
            errors: BTreeMap::new(),
            changed_data: Vec::new(),
        }
    }

    /// Binds the form to an existing record.
    #[must_use]
    pub fn instance(mut self, instance: Option<Record>) -> Self {
        self.instance = instance;
        self
    }

    /// Namespaces every input key as `"{prefix}-{field}"`.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub const fn extra_fields(mut self, extra_fields: &'a [ExtraField]) -> Self {
        self.extra_fields = extra_fields;
        self
    }

    pub fn meta(&self) -> &Arc<ModelMeta> {
        &self.meta
    }

    /// The bound record, if editing.
    pub const fn instance_record(&self) -> Option<&Record> {
        self.instance.as_ref()
    }

    pub fn instance_pk(&self) -> Option<i64> {
        self.instance.as_ref().and_then(|r| self.meta.pk_of(r))
    }

    /// Model fields in the form, in declaration order of the field list.
    pub fn field_names(&self) -> &[String] {
        &self.fields
    }

    /// The input key for `name`.
    pub fn add_prefix(&self, name: &str) -> String {
        self.prefix
            .as_ref()
            .map_or_else(|| name.to_string(), |p| format!("{p}-{name}"))
    }

    /// The value a field starts from: the instance's value, else its default.
    fn initial(&self, field: &FieldDef) -> Value {
        if let Some(instance) = &self.instance {
            return instance.get(field.name).cloned().unwrap_or(Value::Null);
        }
        field.default_value().unwrap_or(Value::Null)
    }

    /// Cleans and validates every field. Returns whether the form is valid.
    pub fn full_clean(&mut self, ctx: QueryContext<'_>) -> bool {
        self.cleaned_data.clear();
        self.errors.clear();
        self.changed_data.clear();

        let meta = Arc::clone(&self.meta);
        for name in self.fields.clone() {
            let Some(field) = meta.get_field(&name) else {
                continue;
            };
            let key = self.add_prefix(&name);
            let initial = self.instance.as_ref().and_then(|r| r.get(&name)).cloned();
            match clean_field(ctx, field, self.data, &key, initial.as_ref()) {
                Ok(value) => {
                    if !same_value(&value, &self.initial(field)) {
                        self.changed_data.push(name.clone());
                    }
                    self.cleaned_data.insert(name, value);
                }
                Err(errors) => self.push_errors(&name, &errors),
            }
        }
        for extra in self.extra_fields {
            let key = self.add_prefix(extra.name());
            match clean_field(ctx, &extra.def, self.data, &key, None) {
                Ok(value) => {
                    self.cleaned_data.insert(extra.name().to_string(), value);
                }
                Err(errors) => self.push_errors(extra.name(), &errors),
            }
        }
        self.validate_unique(ctx.tables);
        self.errors.is_empty()
    }

    fn push_errors(&mut self, name: &str, errors: &[ValidationError]) {
        self.errors
            .entry(name.to_string())
            .or_default()
            .extend(errors.iter().map(ValidationError::render));
    }

    pub fn add_error(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Adds an error not tied to a field.
    pub fn add_non_field_error(&mut self, message: impl Into<String>) {
        self.add_error(NON_FIELD_ERRORS, message);
    }

    fn validate_unique(&mut self, tables: &Tables) {
        let own_pk = self.instance_pk();
        let meta = Arc::clone(&self.meta);
        for field in meta.fields.iter().filter(|f| f.unique || f.primary_key) {
            if self.errors.contains_key(field.name) {
                continue;
            }
            let Some(value) = self
                .cleaned_data
                .get(field.name)
                .filter(|v| !v.is_null() && v.as_str() != Some(""))
            else {
                continue;
            };
            let clash = tables.all(&meta).into_iter().any(|row| {
                meta.pk_of(row) != own_pk && row.get(field.name).is_some_and(|v| loose_eq(v, value))
            });
            if clash {
                let message = ValidationError::new(
                    "%(model_name)s with this %(field_label)s already exists.",
                    "unique",
                )
                .with_param("model_name", capfirst(&meta.verbose_name))
                .with_param("field_label", capfirst(&field.verbose_name))
                .render();
                self.errors
                    .entry(field.name.to_string())
                    .or_default()
                    .push(message);
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors as `{field: [message, ...]}`.
    pub fn errors(&self) -> Value {
        json!(self.errors)
    }

    pub const fn cleaned_data(&self) -> &Record {
        &self.cleaned_data
    }

    /// Overrides a cleaned value before saving.
    pub fn set_cleaned(&mut self, name: impl Into<String>, value: Value) {
        self.cleaned_data.insert(name.into(), value);
    }

    /// Fields whose cleaned value differs from the initial one.
    pub fn changed_data(&self) -> &[String] {
        &self.changed_data
    }

    /// Labels of the changed fields, as shown in change messages.
    pub fn changed_labels(&self) -> Vec<String> {
        self.changed_data
            .iter()
            .filter_map(|name| self.meta.get_field(name))
            .map(|f| capfirst(&f.verbose_name))
            .collect()
    }

    /// Whether the submitted input differs from the initial values.
    ///
    /// Works on raw input, so it can be asked before validation; unsubmitted
    /// keys count as unchanged.
    pub fn has_changed(&self) -> bool {
        self.fields.iter().any(|name| {
            let Some(field) = self.meta.get_field(name) else {
                return false;
            };
            let key = self.add_prefix(name);
            if self.data.file(&key).is_some() {
                return true;
            }
            if !self.data.contains(&key) {
                return false;
            }
            raw_differs(field, self.data, &key, &self.initial(field))
        })
    }

    /// Builds the record to store from the instance and cleaned data.
    pub fn construct_instance(&self) -> Record {
        let creating = self.instance.is_none();
        let mut record = self.instance.clone().unwrap_or_default();
        let now = chrono::Utc::now().naive_utc();
        for field in &self.meta.fields {
            if let Some(value) = self.cleaned_data.get(field.name) {
                if field.editable {
                    record.insert(field.name.to_string(), value.clone());
                    continue;
                }
            }
            if field.auto_now || (creating && field.auto_now_add) {
                let stamp = if field.field_type == FieldType::DateField {
                    now.format("%Y-%m-%d").to_string()
                } else {
                    now.format("%Y-%m-%dT%H:%M:%S").to_string()
                };
                record.insert(field.name.to_string(), Value::String(stamp));
                continue;
            }
            if creating && !record.contains_key(field.name) {
                if field.primary_key && field.auto_created {
                    continue;
                }
                record.insert(field.name.to_string(), initial_for_new(field));
            }
        }
        record
    }

    /// Stores the form's record and returns its primary key.
    ///
    /// # Errors
    ///
    /// Propagates storage failures (uniqueness, missing row).
    pub fn save(&mut self, tables: &mut Tables) -> MisResult<i64> {
        let record = self.construct_instance();
        let pk = match self.instance_pk() {
            Some(pk) => {
                tables.update(&self.meta, pk, record)?;
                pk
            }
            None => tables.insert(&self.meta, record)?,
        };
        self.instance = tables.get(&self.meta, pk).cloned();
        Ok(pk)
    }
}

/// Value stored in a new row for a field the form did not carry.
fn initial_for_new(field: &FieldDef) -> Value {
    if let Some(default) = field.default_value() {
        return default;
    }
    match field.field_type {
        FieldType::ManyToManyField { .. } => json!([]),
        FieldType::CharField
        | FieldType::TextField
        | FieldType::SlugField
        | FieldType::EmailField
        | FieldType::UrlField
        | FieldType::FileField { .. }
        | FieldType::ImageField { .. }
            if !field.null =>
        {
            Value::String(String::new())
        }
        _ => Value::Null,
    }
}

/// Compares cleaned and initial values, treating `null`, `""` and `[]` alike.
fn same_value(a: &Value, b: &Value) -> bool {
    let blank = |v: &Value| match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    if blank(a) && blank(b) {
        return true;
    }
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| loose_eq(p, q))
        }
        _ => a == b || loose_eq(a, b),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn raw_differs(field: &FieldDef, data: &FormData, key: &str, initial: &Value) -> bool {
    match &field.field_type {
        FieldType::BooleanField => {
            let raw = data.get(key).unwrap_or_default().trim().to_lowercase();
            let submitted = matches!(raw.as_str(), "true" | "1" | "on" | "yes");
            submitted != initial.as_bool().unwrap_or(false)
        }
        FieldType::ManyToManyField { .. } | FieldType::ArrayField { .. } => {
            let submitted: Vec<&str> = data
                .get_list(key)
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect();
            let initial: Vec<String> = initial
                .as_array()
                .map(|items| items.iter().map(text_of).collect())
                .unwrap_or_default();
            submitted != initial
        }
        _ => data.get(key).unwrap_or_default().trim() != text_of(initial),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_mis_db::model::ModelRegistry;

    fn registry() -> (ModelRegistry, Arc<ModelMeta>) {
        let mut registry = ModelRegistry::new();
        let author = registry.register(
            ModelMeta::new("library", "Author")
                .field(FieldDef::new("name", FieldType::CharField).max_length(20).unique())
                .field(FieldDef::new("age", FieldType::IntegerField).blank().nullable())
                .field(FieldDef::new("rank", FieldType::IntegerField).default(3))
                .field(FieldDef::new("joined", FieldType::DateTimeField).auto_now_add()),
        );
        (registry, author)
    }

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn data(value: Value) -> FormData {
        FormData::from_json(&value)
    }

    #[test]
    fn test_valid_create() {
        let (registry, author) = registry();
        let mut tables = Tables::default();
        let input = data(json!({"name": "Ann", "age": "31"}));
        let mut form = ModelForm::new(Arc::clone(&author), &fields(&["name", "age"]), &input);
        let ctx = QueryContext {
            registry: &registry,
            tables: &tables,
        };
        assert!(form.full_clean(ctx));
        assert_eq!(form.cleaned_data()["age"], json!(31));

        let pk = form.save(&mut tables).unwrap();
        let row = tables.get(&author, pk).unwrap();
        assert_eq!(row["name"], json!("Ann"));
        assert_eq!(row["rank"], json!(3));
        assert!(row["joined"].as_str().is_some_and(|s| s.len() == 19));
    }

    #[test]
    fn test_required_and_type_errors() {
        let (registry, author) = registry();
        let tables = Tables::default();
        let input = data(json!({"age": "old"}));
        let mut form = ModelForm::new(author, &fields(&["name", "age"]), &input);
        let ctx = QueryContext {
            registry: &registry,
            tables: &tables,
        };
        assert!(!form.full_clean(ctx));
        assert_eq!(
            form.errors(),
            json!({"name": ["This field is required."], "age": ["Enter a whole number."]})
        );
    }

    #[test]
    fn test_unique_check_skips_own_row() {
        let (registry, author) = registry();
        let mut tables = Tables::default();
        let first = tables
            .insert(&author, json!({"name": "Ann"}).as_object().cloned().unwrap())
            .unwrap();

        let input = data(json!({"name": "Ann"}));
        let ctx = QueryContext {
            registry: &registry,
            tables: &tables,
        };
        let mut clash = ModelForm::new(Arc::clone(&author), &fields(&["name"]), &input);
        assert!(!clash.full_clean(ctx));
        assert_eq!(
            clash.errors(),
            json!({"name": ["Author with this Name already exists."]})
        );

        let instance = tables.get(&author, first).cloned();
        let mut edit = ModelForm::new(author, &fields(&["name"]), &input).instance(instance);
        assert!(edit.full_clean(ctx));
        assert!(edit.changed_data().is_empty());
    }

    #[test]
    fn test_changed_data_on_edit() {
        let (registry, author) = registry();
        let mut tables = Tables::default();
        let pk = tables
            .insert(
                &author,
                json!({"name": "Ann", "age": 30, "rank": 3}).as_object().cloned().unwrap(),
            )
            .unwrap();
        let input = data(json!({"name": "Ann", "age": 31}));
        let instance = tables.get(&author, pk).cloned();
        let mut form = ModelForm::new(Arc::clone(&author), &fields(&["name", "age"]), &input)
            .instance(instance);
        let ctx = QueryContext {
            registry: &registry,
            tables: &tables,
        };
        assert!(form.full_clean(ctx));
        assert_eq!(form.changed_data(), ["age"]);
        assert_eq!(form.changed_labels(), ["Age"]);

        form.save(&mut tables).unwrap();
        assert_eq!(tables.get(&author, pk).unwrap()["age"], json!(31));
        assert_eq!(tables.count(&author), 1);
    }

    #[test]
    fn test_prefix_and_has_changed() {
        let (_, author) = registry();
        let mut input = FormData::new();
        input.set("authors-0-name", "");
        input.set("authors-0-rank", "3");
        {
            let form = ModelForm::new(Arc::clone(&author), &fields(&["name", "rank"]), &input)
                .prefix("authors-0");
            assert_eq!(form.add_prefix("name"), "authors-0-name");
            assert!(!form.has_changed());
        }

        input.set("authors-0-name", "Bo");
        let form =
            ModelForm::new(author, &fields(&["name", "rank"]), &input).prefix("authors-0");
        assert!(form.has_changed());
    }

    #[test]
    fn test_extra_field_is_cleaned_not_stored() {
        let (registry, author) = registry();
        let extras = [ExtraField::new(
            FieldDef::new("password", FieldType::CharField).max_length(8),
        )
        .input_type("password")];
        let mut tables = Tables::default();
        let input = data(json!({"name": "Ann", "password": "secret"}));
        let mut form =
            ModelForm::new(Arc::clone(&author), &fields(&["name"]), &input).extra_fields(&extras);
        let ctx = QueryContext {
            registry: &registry,
            tables: &tables,
        };
        assert!(form.full_clean(ctx));
        assert_eq!(form.cleaned_data()["password"], json!("secret"));
        let pk = form.save(&mut tables).unwrap();
        assert!(!tables.get(&author, pk).unwrap().contains_key("password"));
    }

    #[test]
    fn test_non_editable_fields_dropped() {
        let (_, author) = registry();
        let input = FormData::new();
        let form = ModelForm::new(author, &fields(&["id", "name", "nope"]), &input);
        assert_eq!(form.field_names(), ["name"]);
    }
}
