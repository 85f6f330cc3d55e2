//! Inline children attached to detail and write responses.

use admin_mis_auth::User;
use admin_mis_db::{Record, Tables};
use serde_json::{json, Map, Value};

use crate::model_admin::InlineInstance;
use crate::serializer::RecordSerializer;

/// Appends `"inlines": [[row, ...], ...]` to `target` for the children of
/// `parent_pk`: one list per inline that has rows, each row
/// `{data, perms, model_name, app_name}` plus its own `inlines` when nested
/// inlines have rows.
pub fn attach_inline_objects(
    target: &mut Map<String, Value>,
    inlines: &[InlineInstance<'_>],
    user: &User,
    tables: &Tables,
    serializer: &RecordSerializer<'_>,
    parent_pk: i64,
) {
    let mut groups = Vec::new();
    for instance in inlines {
        let model = instance.model();
        let fk = instance.admin.fk();
        let rows: Vec<&Record> = tables
            .all(model)
            .into_iter()
            .filter(|row| row.get(fk).and_then(Value::as_i64) == Some(parent_pk))
            .collect();
        if rows.is_empty() {
            continue;
        }
        let mut group = Vec::with_capacity(rows.len());
        for row in rows {
            let mut entry = Map::new();
            entry.insert("data".into(), serializer.to_representation(model, row));
            entry.insert("perms".into(), json!(instance.admin.object_perms(user, row)));
            entry.insert("model_name".into(), json!(model.model_name));
            entry.insert("app_name".into(), json!(model.app_label));
            if let Some(pk) = model.pk_of(row) {
                attach_inline_objects(
                    &mut entry,
                    &instance.children,
                    user,
                    tables,
                    serializer,
                    pk,
                );
            }
            group.push(Value::Object(entry));
        }
        groups.push(Value::Array(group));
    }
    if !groups.is_empty() {
        target.insert("inlines".into(), Value::Array(groups));
    }
}
