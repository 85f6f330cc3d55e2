//! Field descriptors for building create and edit forms.
//!
//! One descriptor per model field (auto-created fields other than the primary
//! key are left out), then one per form-only field of the admin, then the
//! inlines with their own descriptors.

use admin_mis_auth::User;
use admin_mis_db::{FieldDef, LookupKind, ModelMeta};
use admin_mis_forms::ExtraField;
use serde_json::{json, Map, Value};

use crate::model_admin::{InlineInstance, ModelAdmin};
use crate::utils::py_str;

/// The `fields` endpoint body: `{fields, perms}` and `inlines` when the user
/// sees any.
///
/// `api_root` is the absolute URL of the API root, ending in `/`.
pub fn fields_metadata(admin: &ModelAdmin, user: &User, api_root: &str) -> Value {
    let form_fields = admin.form_fields();
    let mut fields = Vec::new();
    for field in &admin.meta.fields {
        if field.auto_created && !field.primary_key {
            continue;
        }
        let in_form = form_fields.iter().any(|f| f == field.name);
        let editable = field.editable && in_form && !field.primary_key;
        fields.push(field_meta(field, editable, None, in_form, api_root));
    }
    fields.extend(admin.extra_fields.iter().map(extra_field_meta));

    let mut out = Map::new();
    out.insert("fields".into(), Value::Array(fields));
    out.insert("perms".into(), json!(admin.get_model_perms(user)));
    let inlines = admin.get_inline_instances(user);
    if !inlines.is_empty() {
        out.insert("inlines".into(), inline_metadata(&inlines, None, api_root));
    }
    Value::Object(out)
}

/// Describes one model field.
///
/// When `parent_label` names the related model, the field is the foreign key
/// of an inline back to its parent.
pub fn field_meta(
    field: &FieldDef,
    editable: bool,
    parent_label: Option<&str>,
    in_form: bool,
    api_root: &str,
) -> Value {
    let field_type = field.field_type_name();

    if let Some(related) = field.related_model() {
        if parent_label == Some(related) {
            return json!({
                "name": field.name,
                "verbose_name": field.verbose_name,
                "required": field.blank,
                "help_text": field.help_text,
                "field_type": field_type,
                "editable": false,
                "inline_parent": true,
            });
        }
        return json!({
            "name": field.name,
            "query": field.limit_choices_json(),
            "verbose_name": field.verbose_name,
            "required": !field.blank,
            "help_text": field.help_text,
            "field_type": field_type,
            "editable": editable,
            "api_link": api_link(field, related, in_form, api_root),
        });
    }

    let mut data = json!({
        "name": field.name,
        "verbose_name": field.verbose_name,
        "validators": validators(field),
        "required": !field.blank,
        "help_text": field.help_text,
        "field_type": field_type,
        "editable": editable,
        "defaults": field.default_value(),
        "choices": field.flatchoices(),
    });
    if let (Some(geo), Value::Object(map)) = (field.geo, &mut data) {
        map.insert("dim".into(), json!(geo.dim));
        map.insert("srid".into(), json!(geo.srid));
        map.insert("geography".into(), json!(geo.geography));
        map.insert("extent".into(), json!(geo.extent));
        map.insert("tolerance".into(), json!(geo.tolerance));
    }
    if let (Some(base), Value::Object(map)) = (&field.base_field, &mut data) {
        map.insert(
            "base_data".into(),
            json!({
                "validators": validators(base),
                "required": !base.blank,
                "help_text": base.help_text,
                "field_type": base.field_type_name(),
                "editable": editable,
                "defaults": base.default_value(),
                "choices": base.flatchoices(),
            }),
        );
    }
    data
}

fn validators(field: &FieldDef) -> Vec<Value> {
    field
        .validators
        .iter()
        .map(|v| Value::Object(v.describe()))
        .collect()
}

/// Listing URL of the related model. Fields on the admin form also get the
/// relation's `limit_choices_to` as lookup parameters.
fn api_link(field: &FieldDef, related_label: &str, in_form: bool, api_root: &str) -> String {
    let segment = related_label.replace('.', "/").replace(['_', ' '], "-");
    let mut link = format!("{api_root}{segment}/");
    if in_form {
        let mut query = vec!["filter_list=true".to_string()];
        for (lookup, value) in &field.limit_choices_to {
            let has_kind = lookup
                .rsplit_once("__")
                .is_some_and(|(_, kind)| LookupKind::from_name(kind).is_some());
            let key = if has_kind {
                lookup.clone()
            } else {
                format!("{lookup}__exact")
            };
            query.push(format!("{key}={}", py_str(value)));
        }
        link.push('?');
        link.push_str(&query.join("&"));
    }
    link
}

fn extra_field_meta(extra: &ExtraField) -> Value {
    let def = &extra.def;
    let max_length = def.max_length.map(|n| json!(n)).or_else(|| {
        def.validators
            .iter()
            .find(|v| v.name() == "MaxValueValidator")
            .and_then(|v| v.describe().get("limit_value").cloned())
    });
    let verbose_name = if extra.label.is_empty() {
        def.name.to_string()
    } else {
        extra.label.clone()
    };
    json!({
        "name": def.name,
        "verbose_name": verbose_name,
        "validators": validators(def),
        "required": extra.required(),
        "help_text": def.help_text,
        "max_length": max_length,
        "field_type": extra.input_type.unwrap_or("string"),
        "editable": true,
        "defaults": Value::Null,
        "choices": def.flatchoices(),
    })
}

/// Descriptors for each inline and, recursively, its nested inlines.
fn inline_metadata(
    inlines: &[InlineInstance<'_>],
    parent_inline_name: Option<&Value>,
    api_root: &str,
) -> Value {
    let mut out = Vec::new();
    for instance in inlines {
        let admin = instance.admin;
        let model = instance.model();
        let parent_label = admin.parent_model().map(|p| p.label_lower());

        let fields: Vec<Value> = model
            .fields
            .iter()
            .filter(|f| !f.auto_created || f.primary_key)
            .map(|field| {
                let readonly = admin.readonly_fields.iter().any(|r| r == field.name);
                let editable = field.editable && !readonly && !field.primary_key;
                field_meta(field, editable, parent_label.as_deref(), false, api_root)
            })
            .collect();

        let inline_name = match parent_inline_name {
            None => json!(model.verbose_name.to_lowercase().replace(' ', "_")),
            Some(parent) => json!([parent, pk_related_name(admin.fk(), model)]),
        };

        let mut data = Map::new();
        data.insert("fields".into(), Value::Array(fields));
        data.insert("model_name".into(), json!(model.model_name));
        data.insert("inline_name".into(), inline_name.clone());
        data.insert("app_name".into(), json!(model.app_label));
        data.insert("max_num".into(), json!(instance.max_num));
        data.insert("min_num".into(), json!(admin.min_num));
        data.insert("extra".into(), json!(admin.extra));
        data.insert("perms".into(), json!(instance.perms));
        if !instance.children.is_empty() {
            data.insert(
                "inlines".into(),
                inline_metadata(&instance.children, Some(&inline_name), api_root),
            );
        }
        out.push(Value::Object(data));
    }
    Value::Array(out)
}

/// The name the parent model uses to query the inline's rows.
fn pk_related_name(fk: &str, model: &ModelMeta) -> String {
    model
        .get_field(fk)
        .map_or_else(|| model.model_name.clone(), |f| f.related_query_name(&model.model_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_admin::InlineAdmin;
    use admin_mis_db::{FieldType, GeometryType, ModelRegistry, OnDelete};
    use std::sync::Arc;

    const ROOT: &str = "http://testserver/api/v1/admin/";

    fn fk(to: &str, related_name: Option<&str>) -> FieldType {
        FieldType::ForeignKey {
            to: to.into(),
            on_delete: OnDelete::Cascade,
            related_name: related_name.map(String::from),
        }
    }

    fn admin() -> ModelAdmin {
        let mut registry = ModelRegistry::new();
        registry.register(
            ModelMeta::new("my_app", "Foreign_Owner")
                .field(FieldDef::new("name", FieldType::CharField).max_length(5)),
        );
        let order = registry.register(
            ModelMeta::new("shop", "Order")
                .field(
                    FieldDef::new("code", FieldType::CharField)
                        .max_length(10)
                        .help_text("Order code")
                        .default("A-1"),
                )
                .field(
                    FieldDef::new("owner", fk("my_app.foreign_owner", None))
                        .limit_choices_to("name__icontains", "a")
                        .limit_choices_to("active", true),
                )
                .field(
                    FieldDef::new("tags", FieldType::ArrayField { size: Some(3) })
                        .base_field(FieldDef::new("tag", FieldType::IntegerField)),
                )
                .field(
                    FieldDef::new(
                        "spot",
                        FieldType::GeometryField {
                            geom_type: GeometryType::Point,
                        },
                    )
                    .srid(3857),
                )
                .field(FieldDef::new("notes", FieldType::TextField).blank()),
        );
        let line = registry.register(
            ModelMeta::new("shop", "OrderLine")
                .field(FieldDef::new("order", fk("shop.order", Some("lines"))))
                .field(FieldDef::new("qty", FieldType::IntegerField)),
        );
        let note = registry.register(
            ModelMeta::new("shop", "LineNote")
                .field(FieldDef::new("line", fk("shop.orderline", None)))
                .field(FieldDef::new("text", FieldType::CharField).max_length(20)),
        );
        let mut admin = ModelAdmin::new(order)
            .readonly_fields(vec!["notes"])
            .extra_field(
                ExtraField::new(FieldDef::new("password", FieldType::CharField).max_length(30))
                    .label("Password")
                    .input_type("password"),
            )
            .inlines(vec![InlineAdmin::new(line)
                .max_num(4)
                .readonly_fields(vec!["qty"])
                .inlines(vec![InlineAdmin::new(note).extra(1)])]);
        admin.resolve_inlines(&registry).unwrap();
        admin
    }

    fn by_name<'a>(fields: &'a Value, name: &str) -> &'a Value {
        fields
            .as_array()
            .and_then(|list| list.iter().find(|f| f["name"] == name))
            .unwrap()
    }

    #[test]
    fn test_model_fields() {
        let admin = admin();
        let meta = fields_metadata(&admin, &User::new(1, "root").superuser(), ROOT);
        let fields = &meta["fields"];
        assert_eq!(fields.as_array().unwrap().len(), 7);

        let id = by_name(fields, "id");
        assert_eq!(id["editable"], false);
        assert_eq!(id["required"], false);

        let code = by_name(fields, "code");
        assert_eq!(code["editable"], true);
        assert_eq!(code["required"], true);
        assert_eq!(code["defaults"], "A-1");
        assert_eq!(code["field_type"], "string");
        assert_eq!(code["validators"][0]["code"], "max_length");

        assert_eq!(by_name(fields, "notes")["editable"], false);

        let spot = by_name(fields, "spot");
        assert_eq!(spot["field_type"], "point");
        assert_eq!(spot["srid"], 3857);

        assert_eq!(by_name(fields, "tags")["base_data"]["field_type"], "integer");

        let password = by_name(fields, "password");
        assert_eq!(password["field_type"], "password");
        assert_eq!(password["max_length"], 30);
        assert_eq!(password["verbose_name"], "Password");
        assert_eq!(
            meta["perms"],
            json!({"add": true, "change": true, "delete": true, "view": true})
        );
    }

    #[test]
    fn test_relation_api_link() {
        let admin = admin();
        let meta = fields_metadata(&admin, &User::new(1, "root").superuser(), ROOT);
        let owner = by_name(&meta["fields"], "owner");
        assert_eq!(owner["field_type"], "foreign key");
        assert_eq!(
            owner["api_link"],
            "http://testserver/api/v1/admin/my-app/foreign-owner/\
             ?filter_list=true&name__icontains=a&active__exact=True"
        );
        assert_eq!(owner["query"], json!({"name__icontains": "a", "active": true}));
        assert!(owner.get("validators").is_none());
    }

    #[test]
    fn test_field_meta_for_parent_key() {
        let field = FieldDef::new("order", fk("shop.order", None)).blank();

        let parent = field_meta(&field, true, Some("shop.order"), false, ROOT);
        assert_eq!(parent["inline_parent"], true);
        assert_eq!(parent["editable"], false);
        assert_eq!(parent["required"], true);
        assert!(parent.get("api_link").is_none());

        let relation = field_meta(&field, true, None, false, ROOT);
        assert!(relation.get("inline_parent").is_none());
        assert_eq!(relation["editable"], true);
        assert_eq!(relation["required"], false);
        assert_eq!(relation["api_link"], "http://testserver/api/v1/admin/shop/order/");
    }

    #[test]
    fn test_inlines() {
        let admin = admin();
        let meta = fields_metadata(&admin, &User::new(1, "root").superuser(), ROOT);
        let line = &meta["inlines"][0];
        assert_eq!(line["inline_name"], "order_line");
        assert_eq!(line["max_num"], 4);
        assert_eq!(line["min_num"], Value::Null);
        assert_eq!(line["extra"], 3);
        let parent = by_name(&line["fields"], "order");
        assert_eq!(parent["inline_parent"], true);
        assert_eq!(parent["editable"], false);
        assert_eq!(by_name(&line["fields"], "qty")["editable"], false);

        let note = &line["inlines"][0];
        assert_eq!(note["inline_name"], json!(["order_line", "linenote"]));
        assert_eq!(note["extra"], 1);
    }

    #[test]
    fn test_inlines_hidden_without_perms() {
        let admin = admin();
        let user = User::new(2, "clerk").with_perm("shop.view_order");
        let meta = fields_metadata(&admin, &user, ROOT);
        assert!(meta.get("inlines").is_none());
        assert_eq!(
            meta["perms"],
            json!({"add": false, "change": false, "delete": false, "view": true})
        );
    }
}
