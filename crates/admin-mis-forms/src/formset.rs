//! Inline formsets: the child rows edited together with a parent record.
//!
//! An [`InlineFormSet`] reads its management form (`TOTAL_FORMS`,
//! `INITIAL_FORMS`, `MIN_NUM_FORMS`, `MAX_NUM_FORMS`) from the submitted
//! data, binds one [`ModelForm`] per submitted row, and saves the rows against
//! the parent's primary key. Rows can carry nested formsets of their own.
//!
//! Input keys follow the `"{prefix}-{index}-{field}"` scheme, with the row's
//! primary key under `"{prefix}-{index}-{pk}"` and the deletion flag under
//! `"{prefix}-{index}-DELETE"`. A nested formset's prefix is
//! `"{prefix}-{index}-{child_prefix}"`.

use std::sync::Arc;

use admin_mis_core::{MisError, MisResult};
use admin_mis_db::deletion::{Collector, DeletionPlan};
use admin_mis_db::fields::FieldType;
use admin_mis_db::model::{capfirst, ModelMeta, ModelRegistry};
use admin_mis_db::query::QueryContext;
use admin_mis_db::store::Tables;
use serde_json::{json, Map, Value};

use crate::data::FormData;
use crate::fields::INVALID_MODEL_CHOICE;
use crate::model_form::ModelForm;

const TOTAL_FORMS: &str = "TOTAL_FORMS";
const INITIAL_FORMS: &str = "INITIAL_FORMS";
pub const MIN_NUM_FORMS: &str = "MIN_NUM_FORMS";
pub const MAX_NUM_FORMS: &str = "MAX_NUM_FORMS";
const DELETION_FIELD: &str = "DELETE";

/// Upper bound on `max_num` when none is configured.
pub const DEFAULT_MAX_NUM: usize = 1000;

/// How an inline formset is built, with permissions already resolved for the
/// requesting user.
#[derive(Debug, Clone)]
pub struct FormSetSpec {
    pub model: Arc<ModelMeta>,
    /// The foreign key on `model` that points at the parent.
    pub fk_name: &'static str,
    pub prefix: String,
    /// Editable fields of each row form. The foreign key is never included.
    pub fields: Vec<String>,
    pub extra: usize,
    pub min_num: usize,
    pub max_num: usize,
    pub validate_min: bool,
    pub validate_max: bool,
    pub can_add: bool,
    pub can_change: bool,
    pub can_delete: bool,
    pub children: Vec<FormSetSpec>,
}

impl FormSetSpec {
    /// A spec with every editable field and full permissions.
    pub fn new(model: Arc<ModelMeta>, fk_name: &'static str) -> Self {
        let prefix = default_prefix(&model, fk_name);
        let fields = model
            .fields
            .iter()
            .filter(|f| f.editable && !f.primary_key && f.name != fk_name)
            .map(|f| f.name.to_string())
            .collect();
        Self {
            model,
            fk_name,
            prefix,
            fields,
            extra: 3,
            min_num: 0,
            max_num: DEFAULT_MAX_NUM,
            validate_min: false,
            validate_max: false,
            can_add: true,
            can_change: true,
            can_delete: true,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn fields(mut self, fields: &[String]) -> Self {
        self.fields = fields
            .iter()
            .filter(|f| f.as_str() != self.fk_name)
            .cloned()
            .collect();
        self
    }

    #[must_use]
    pub const fn counts(mut self, extra: usize, min_num: usize, max_num: usize) -> Self {
        self.extra = extra;
        self.min_num = min_num;
        self.max_num = max_num;
        self
    }

    #[must_use]
    pub const fn validate(mut self, validate_min: bool, validate_max: bool) -> Self {
        self.validate_min = validate_min;
        self.validate_max = validate_max;
        self
    }

    #[must_use]
    pub const fn permissions(mut self, can_add: bool, can_change: bool, can_delete: bool) -> Self {
        self.can_add = can_add;
        self.can_change = can_change;
        self.can_delete = can_delete;
        self
    }

    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }
}

/// The default prefix: the relation's `related_name`, else `"{model}_set"`
/// (`"{model}"` for one-to-one relations).
pub fn default_prefix(model: &ModelMeta, fk_name: &str) -> String {
    match model.get_field(fk_name).map(|f| &f.field_type) {
        Some(
            FieldType::ForeignKey {
                related_name: Some(name),
                ..
            }
            | FieldType::OneToOneField {
                related_name: Some(name),
                ..
            },
        ) => name.clone(),
        Some(FieldType::OneToOneField { .. }) => model.model_name.clone(),
        _ => format!("{}_set", model.model_name),
    }
}

/// One saved change, used to build change messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormSetChange {
    Added {
        name: String,
        object: String,
    },
    Changed {
        name: String,
        object: String,
        fields: Vec<String>,
    },
    Deleted {
        name: String,
        object: String,
    },
}

#[derive(Debug)]
struct InlineForm<'a> {
    form: ModelForm<'a>,
    initial: bool,
    deleted: bool,
    /// Not validated or saved: an untouched extra row, or one the user may
    /// not add or change.
    skipped: bool,
    id_error: bool,
    children: Vec<InlineFormSet<'a>>,
}

impl InlineForm<'_> {
    fn has_changed(&self) -> bool {
        self.form.has_changed() || self.children.iter().any(InlineFormSet::has_changed)
    }
}

/// A bound inline formset.
#[derive(Debug)]
pub struct InlineFormSet<'a> {
    spec: &'a FormSetSpec,
    prefix: String,
    forms: Vec<InlineForm<'a>>,
    non_form_errors: Vec<String>,
    valid: bool,
}

impl<'a> InlineFormSet<'a> {
    /// Binds the formset for the children of `parent_pk` (none when the parent
    /// is being created).
    pub fn bind(
        ctx: QueryContext<'_>,
        spec: &'a FormSetSpec,
        data: &'a FormData,
        parent_pk: Option<i64>,
    ) -> Self {
        Self::bind_prefixed(ctx, spec, data, parent_pk, spec.prefix.clone())
    }

    fn bind_prefixed(
        ctx: QueryContext<'_>,
        spec: &'a FormSetSpec,
        data: &'a FormData,
        parent_pk: Option<i64>,
        prefix: String,
    ) -> Self {
        let count = |name: &str| {
            data.get(&format!("{prefix}-{name}"))
                .and_then(|v| v.trim().parse::<usize>().ok())
        };
        let total = count(TOTAL_FORMS)
            .unwrap_or(0)
            .min(spec.max_num.saturating_add(DEFAULT_MAX_NUM));
        let initial_count = count(INITIAL_FORMS).unwrap_or(0).min(total);
        if count(TOTAL_FORMS).is_none() {
            tracing::debug!(prefix = %prefix, "no management form; binding zero forms");
        }

        let model = &spec.model;
        let pk_name = model.pk_name();
        let existing: Vec<i64> = match parent_pk {
            Some(parent) => ctx
                .tables
                .all(model)
                .into_iter()
                .filter(|row| row.get(spec.fk_name).and_then(Value::as_i64) == Some(parent))
                .filter_map(|row| model.pk_of(row))
                .collect(),
            None => Vec::new(),
        };

        let mut forms = Vec::with_capacity(total);
        for i in 0..total {
            let form_prefix = format!("{prefix}-{i}");
            let initial = i < initial_count;
            let mut instance = None;
            let mut id_error = false;
            if initial {
                let pk = data
                    .get(&format!("{form_prefix}-{pk_name}"))
                    .and_then(|v| v.trim().parse::<i64>().ok())
                    .filter(|pk| existing.contains(pk));
                match pk {
                    Some(pk) => instance = ctx.tables.get(model, pk).cloned(),
                    None => id_error = true,
                }
            }
            let deleted = initial
                && spec.can_delete
                && data
                    .get(&format!("{form_prefix}-{DELETION_FIELD}"))
                    .is_some_and(|v| {
                        matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "on")
                    });
            let instance_pk = instance.as_ref().and_then(|r| model.pk_of(r));
            let children = spec
                .children
                .iter()
                .map(|child| {
                    let child_prefix = format!("{form_prefix}-{}", child.prefix);
                    Self::bind_prefixed(ctx, child, data, instance_pk, child_prefix)
                })
                .collect();
            let form = ModelForm::new(Arc::clone(model), &spec.fields, data)
                .instance(instance)
                .prefix(form_prefix);
            forms.push(InlineForm {
                form,
                initial,
                deleted,
                skipped: false,
                id_error,
                children,
            });
        }

        Self {
            spec,
            prefix,
            forms,
            non_form_errors: Vec::new(),
            valid: true,
        }
    }

    pub fn spec(&self) -> &FormSetSpec {
        self.spec
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn total_form_count(&self) -> usize {
        self.forms.len()
    }

    /// Whether any row was edited, added or marked for deletion.
    pub fn has_changed(&self) -> bool {
        self.forms.iter().any(|f| f.deleted || f.has_changed())
    }

    /// Validates every row and the row counts. Returns whether the formset
    /// (including nested formsets) is valid.
    pub fn full_clean(&mut self, ctx: QueryContext<'_>) -> bool {
        self.non_form_errors.clear();
        let spec = self.spec;
        let mut valid = true;
        let mut live = 0usize;

        for inline in &mut self.forms {
            inline.skipped = false;
            if inline.deleted {
                inline.skipped = true;
                let pk = inline.form.instance_pk();
                if let Some(message) = protected_message(ctx, inline.form.meta(), pk) {
                    inline.form.add_non_field_error(message);
                    valid = false;
                }
                continue;
            }
            if inline.initial {
                live += 1;
                if !spec.can_change {
                    inline.skipped = true;
                    continue;
                }
            } else {
                if !spec.can_add || !inline.has_changed() {
                    inline.skipped = true;
                    continue;
                }
                live += 1;
            }

            let mut form_valid = inline.form.full_clean(ctx);
            if inline.id_error {
                inline.form.add_error(spec.model.pk_name(), INVALID_MODEL_CHOICE);
                form_valid = false;
            }
            for child in &mut inline.children {
                form_valid &= child.full_clean(ctx);
            }
            valid &= form_valid;
        }

        if spec.validate_max && live > spec.max_num {
            self.non_form_errors
                .push(count_message("at most", spec.max_num));
        }
        if spec.validate_min && live < spec.min_num {
            self.non_form_errors
                .push(count_message("at least", spec.min_num));
        }
        self.valid = valid && self.non_form_errors.is_empty();
        self.valid
    }

    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn non_form_errors(&self) -> &[String] {
        &self.non_form_errors
    }

    /// Per-row errors (`{}` for clean rows), nested formset errors under each
    /// row's `"inlines"`, and a trailing `{"non_form_errors": [...]}` entry
    /// when the row counts are off.
    pub fn errors(&self) -> Value {
        let mut list: Vec<Value> = self
            .forms
            .iter()
            .map(|inline| {
                let mut errors = match inline.form.errors() {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                let nested: Vec<Value> = inline
                    .children
                    .iter()
                    .filter(|child| !inline.skipped && !child.is_valid())
                    .map(InlineFormSet::error_entry)
                    .collect();
                if !nested.is_empty() {
                    errors.insert("inlines".to_string(), Value::Array(nested));
                }
                Value::Object(errors)
            })
            .collect();
        if !self.non_form_errors.is_empty() {
            list.push(json!({ "non_form_errors": self.non_form_errors }));
        }
        Value::Array(list)
    }

    /// `{model_name, app_name, errors}`, as reported under `"inlines"`.
    pub fn error_entry(&self) -> Value {
        json!({
            "model_name": self.spec.model.model_name,
            "app_name": self.spec.model.app_label,
            "errors": self.errors(),
        })
    }

    /// Saves every row against `parent_pk` and returns what changed.
    ///
    /// # Errors
    ///
    /// Fails when a row cannot be stored or a deletion is blocked by a
    /// protecting relation; the caller's transaction should then be dropped.
    pub fn save(
        &mut self,
        registry: &ModelRegistry,
        tables: &mut Tables,
        parent_pk: i64,
    ) -> MisResult<Vec<FormSetChange>> {
        let spec = self.spec;
        let model = Arc::clone(&spec.model);
        let mut changes = Vec::new();

        for inline in &mut self.forms {
            if inline.deleted {
                let Some(pk) = inline.form.instance_pk() else {
                    continue;
                };
                let object = inline
                    .form
                    .instance_record()
                    .map(|r| model.str(r))
                    .unwrap_or_default();
                let plan = plan_delete(registry, tables, &model, pk);
                if plan.is_protected() {
                    return Err(MisError::ProtectedError(format!(
                        "Cannot delete {} \"{object}\": \
                         it is referenced through a protected foreign key.",
                        model.verbose_name
                    )));
                }
                plan.apply(tables);
                tracing::debug!(model = %model.label_lower(), pk, "inline row deleted");
                changes.push(FormSetChange::Deleted {
                    name: model.verbose_name.clone(),
                    object,
                });
                continue;
            }
            if inline.skipped {
                continue;
            }

            let creating = !inline.initial;
            if creating || !inline.form.changed_data().is_empty() {
                inline.form.set_cleaned(spec.fk_name, json!(parent_pk));
                let pk = inline.form.save(tables)?;
                let object = tables.get(&model, pk).map(|r| model.str(r)).unwrap_or_default();
                changes.push(if creating {
                    FormSetChange::Added {
                        name: model.verbose_name.clone(),
                        object,
                    }
                } else {
                    FormSetChange::Changed {
                        name: model.verbose_name.clone(),
                        object,
                        fields: inline.form.changed_labels(),
                    }
                });
            }

            let Some(pk) = inline.form.instance_pk() else {
                continue;
            };
            for child in &mut inline.children {
                changes.extend(child.save(registry, tables, pk)?);
            }
        }
        Ok(changes)
    }
}

/// Cleans every formset, without stopping at the first invalid one.
pub fn all_valid(formsets: &mut [InlineFormSet<'_>], ctx: QueryContext<'_>) -> bool {
    formsets
        .iter_mut()
        .fold(true, |valid, formset| formset.full_clean(ctx) && valid)
}

fn plan_delete(
    registry: &ModelRegistry,
    tables: &Tables,
    model: &Arc<ModelMeta>,
    pk: i64,
) -> DeletionPlan {
    Collector::new(QueryContext { registry, tables }).collect(model, &[pk])
}

fn protected_message(
    ctx: QueryContext<'_>,
    model: &Arc<ModelMeta>,
    pk: Option<i64>,
) -> Option<String> {
    let pk = pk?;
    let plan = Collector::new(ctx).collect(model, &[pk]);
    if !plan.is_protected() {
        return None;
    }
    let instance = ctx.tables.get(model, pk).map(|r| model.str(r)).unwrap_or_default();
    let related: Vec<String> = plan
        .protected
        .iter()
        .filter_map(|row| {
            ctx.tables
                .get(&row.model, row.pk)
                .map(|r| format!("{} {}", capfirst(&row.model.verbose_name), row.model.str(r)))
        })
        .collect();
    Some(format!(
        "Deleting {} {instance} would require deleting the following protected related objects: {}",
        model.verbose_name,
        get_text_list(&related, "and")
    ))
}

/// Joins `["a", "b", "c"]` as `"a, b and c"`.
pub fn get_text_list(items: &[String], last_word: &str) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} {last_word} {last}", init.join(", ")),
    }
}

fn count_message(bound: &str, num: usize) -> String {
    let noun = if num == 1 { "form" } else { "forms" };
    format!("Please submit {bound} {num} {noun}.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_mis_db::fields::{FieldDef, OnDelete};

    struct Fixture {
        registry: ModelRegistry,
        tables: Tables,
        book: Arc<ModelMeta>,
        chapter: Arc<ModelMeta>,
        note: Arc<ModelMeta>,
    }

    fn fk(name: &'static str, to: &str, on_delete: OnDelete) -> FieldDef {
        FieldDef::new(
            name,
            FieldType::ForeignKey {
                to: to.into(),
                on_delete,
                related_name: None,
            },
        )
    }

    impl Fixture {
        fn new() -> Self {
            let mut registry = ModelRegistry::new();
            let book = registry.register(
                ModelMeta::new("library", "Book")
                    .field(FieldDef::new("title", FieldType::CharField).max_length(50)),
            );
            let chapter = registry.register(
                ModelMeta::new("library", "Chapter")
                    .field(fk("book", "library.book", OnDelete::Cascade))
                    .field(FieldDef::new("title", FieldType::CharField).max_length(5))
                    .display(|r| r["title"].as_str().unwrap_or_default().to_string()),
            );
            let note = registry.register(
                ModelMeta::new("library", "Note")
                    .field(fk("chapter", "library.chapter", OnDelete::Protect))
                    .field(FieldDef::new("text", FieldType::TextField)),
            );
            let mut tables = Tables::default();
            let row = |v: Value| v.as_object().cloned().unwrap();
            tables.insert(&book, row(json!({"title": "B"}))).unwrap();
            tables
                .insert(&chapter, row(json!({"book": 1, "title": "one"})))
                .unwrap();
            tables
                .insert(&chapter, row(json!({"book": 1, "title": "two"})))
                .unwrap();
            Self {
                registry,
                tables,
                book,
                chapter,
                note,
            }
        }

        fn ctx(&self) -> QueryContext<'_> {
            QueryContext {
                registry: &self.registry,
                tables: &self.tables,
            }
        }

        fn chapters(&self) -> FormSetSpec {
            FormSetSpec::new(Arc::clone(&self.chapter), "book")
        }
    }

    fn management(data: &mut FormData, prefix: &str, total: usize, initial: usize) {
        data.set(format!("{prefix}-TOTAL_FORMS"), total.to_string());
        data.set(format!("{prefix}-INITIAL_FORMS"), initial.to_string());
    }

    #[test]
    fn test_default_prefix_and_fields() {
        let fx = Fixture::new();
        let spec = fx.chapters();
        assert_eq!(spec.prefix, "chapter_set");
        assert_eq!(spec.fields, ["title"]);
        assert_eq!(default_prefix(&fx.note, "chapter"), "note_set");
    }

    #[test]
    fn test_missing_management_form_binds_nothing() {
        let fx = Fixture::new();
        let spec = fx.chapters();
        let data = FormData::new();
        let mut formset = InlineFormSet::bind(fx.ctx(), &spec, &data, Some(1));
        assert_eq!(formset.total_form_count(), 0);
        assert!(formset.full_clean(fx.ctx()));
    }

    #[test]
    fn test_add_rows_and_skip_empty_extra() {
        let mut fx = Fixture::new();
        let spec = fx.chapters();
        let mut data = FormData::new();
        management(&mut data, "chapter_set", 3, 0);
        data.set("chapter_set-0-title", "new");
        data.set("chapter_set-1-title", "");
        data.set("chapter_set-2-title", "also");

        let mut formset = InlineFormSet::bind(fx.ctx(), &spec, &data, None);
        assert!(formset.full_clean(fx.ctx()));
        let changes = formset.save(&fx.registry, &mut fx.tables, 1).unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes[0],
            FormSetChange::Added {
                name: "chapter".into(),
                object: "new".into()
            }
        );
        assert_eq!(fx.tables.count(&fx.chapter), 4);
        let added = fx.tables.get(&fx.chapter, 3).unwrap();
        assert_eq!(added["book"], json!(1));
    }

    #[test]
    fn test_change_and_delete_existing() {
        let mut fx = Fixture::new();
        let spec = fx.chapters();
        let mut data = FormData::new();
        management(&mut data, "chapter_set", 2, 2);
        data.set("chapter_set-0-id", "1");
        data.set("chapter_set-0-title", "uno");
        data.set("chapter_set-1-id", "2");
        data.set("chapter_set-1-title", "two");
        data.set("chapter_set-1-DELETE", "on");

        let mut formset = InlineFormSet::bind(fx.ctx(), &spec, &data, Some(1));
        assert!(formset.full_clean(fx.ctx()));
        let changes = formset.save(&fx.registry, &mut fx.tables, 1).unwrap();
        assert_eq!(
            changes,
            [
                FormSetChange::Changed {
                    name: "chapter".into(),
                    object: "uno".into(),
                    fields: vec!["Title".into()],
                },
                FormSetChange::Deleted {
                    name: "chapter".into(),
                    object: "two".into(),
                },
            ]
        );
        assert!(!fx.tables.contains(&fx.chapter, 2));
        assert_eq!(fx.tables.get(&fx.chapter, 1).unwrap()["title"], json!("uno"));
    }

    #[test]
    fn test_row_errors_shape() {
        let fx = Fixture::new();
        let spec = fx.chapters();
        let mut data = FormData::new();
        management(&mut data, "chapter_set", 2, 1);
        data.set("chapter_set-0-id", "1");
        data.set("chapter_set-0-title", "one");
        data.set("chapter_set-1-title", "far too long");

        let mut formset = InlineFormSet::bind(fx.ctx(), &spec, &data, Some(1));
        assert!(!formset.full_clean(fx.ctx()));
        assert_eq!(
            formset.errors(),
            json!([
                {},
                {"title": ["Ensure this value has at most 5 characters (it has 12)."]}
            ])
        );
    }

    #[test]
    fn test_unknown_id_is_an_error() {
        let fx = Fixture::new();
        let spec = fx.chapters();
        let mut data = FormData::new();
        management(&mut data, "chapter_set", 1, 1);
        data.set("chapter_set-0-id", "99");
        data.set("chapter_set-0-title", "x");

        let mut formset = InlineFormSet::bind(fx.ctx(), &spec, &data, Some(1));
        assert!(!formset.full_clean(fx.ctx()));
        assert_eq!(formset.errors()[0]["id"], json!([INVALID_MODEL_CHOICE]));
    }

    #[test]
    fn test_validate_max_and_min() {
        let fx = Fixture::new();
        let spec = fx.chapters().counts(0, 3, 1).validate(true, true);
        let mut data = FormData::new();
        management(&mut data, "chapter_set", 2, 2);
        data.set("chapter_set-0-id", "1");
        data.set("chapter_set-0-title", "one");
        data.set("chapter_set-1-id", "2");
        data.set("chapter_set-1-title", "two");

        let mut formset = InlineFormSet::bind(fx.ctx(), &spec, &data, Some(1));
        assert!(!formset.full_clean(fx.ctx()));
        assert_eq!(
            formset.non_form_errors(),
            ["Please submit at most 1 form.", "Please submit at least 3 forms."]
        );
        let errors = formset.errors();
        assert_eq!(
            errors[2],
            json!({
                "non_form_errors": [
                    "Please submit at most 1 form.",
                    "Please submit at least 3 forms.",
                ]
            })
        );
    }

    #[test]
    fn test_permissions_limit_rows() {
        let fx = Fixture::new();
        let spec = fx.chapters().permissions(false, false, false);
        let mut data = FormData::new();
        management(&mut data, "chapter_set", 2, 1);
        data.set("chapter_set-0-id", "1");
        data.set("chapter_set-0-title", "changed");
        data.set("chapter_set-0-DELETE", "on");
        data.set("chapter_set-1-title", "way too long to pass");

        let mut formset = InlineFormSet::bind(fx.ctx(), &spec, &data, Some(1));
        assert!(formset.full_clean(fx.ctx()));
    }

    #[test]
    fn test_nested_formset() {
        let mut fx = Fixture::new();
        let spec = fx
            .chapters()
            .child(FormSetSpec::new(Arc::clone(&fx.note), "chapter"));
        let mut data = FormData::new();
        management(&mut data, "chapter_set", 1, 0);
        data.set("chapter_set-0-title", "three");
        management(&mut data, "chapter_set-0-note_set", 1, 0);
        data.set("chapter_set-0-note_set-0-text", "nested");

        let mut formset = InlineFormSet::bind(fx.ctx(), &spec, &data, Some(1));
        assert!(formset.full_clean(fx.ctx()));
        let changes = formset.save(&fx.registry, &mut fx.tables, 1).unwrap();
        assert_eq!(changes.len(), 2);
        let note = fx.tables.get(&fx.note, 1).unwrap();
        assert_eq!(note["chapter"], json!(3));
        assert_eq!(note["text"], json!("nested"));
    }

    #[test]
    fn test_nested_errors_reported_under_inlines() {
        let fx = Fixture::new();
        let spec = fx
            .chapters()
            .child(
                FormSetSpec::new(Arc::clone(&fx.note), "chapter")
                    .validate(true, false)
                    .counts(0, 2, 10),
            );
        let mut data = FormData::new();
        management(&mut data, "chapter_set", 1, 0);
        data.set("chapter_set-0-title", "three");
        management(&mut data, "chapter_set-0-note_set", 0, 0);

        let mut formset = InlineFormSet::bind(fx.ctx(), &spec, &data, None);
        assert!(!formset.full_clean(fx.ctx()));
        assert_eq!(
            formset.errors(),
            json!([{
                "inlines": [{
                    "model_name": "note",
                    "app_name": "library",
                    "errors": [{"non_form_errors": ["Please submit at least 2 forms."]}]
                }]
            }])
        );
    }

    #[test]
    fn test_protected_delete_is_a_form_error() {
        let mut fx = Fixture::new();
        let note = json!({"chapter": 1, "text": "pinned"}).as_object().cloned().unwrap();
        fx.tables.insert(&fx.note, note).unwrap();
        let spec = fx.chapters();
        let mut data = FormData::new();
        management(&mut data, "chapter_set", 1, 1);
        data.set("chapter_set-0-id", "1");
        data.set("chapter_set-0-title", "one");
        data.set("chapter_set-0-DELETE", "true");

        let mut formset = InlineFormSet::bind(fx.ctx(), &spec, &data, Some(1));
        assert!(!formset.full_clean(fx.ctx()));
        let expected = "Deleting chapter one would require deleting the following \
                        protected related objects: Note Note object (1)";
        assert_eq!(formset.errors()[0]["__all__"], json!([expected]));
        assert!(fx.tables.contains(&fx.book, 1));
    }

    #[test]
    fn test_get_text_list() {
        let items: Vec<String> = ["a", "b", "c"].iter().map(ToString::to_string).collect();
        assert_eq!(get_text_list(&items, "and"), "a, b and c");
        assert_eq!(get_text_list(&items[..1], "and"), "a");
        assert_eq!(get_text_list(&[], "or"), "");
    }
}
