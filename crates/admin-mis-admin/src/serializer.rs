//! Record serialization for detail and write responses.

use admin_mis_db::{FieldType, ModelMeta, QueryContext, Record};
use serde_json::{json, Map, Value};

/// Turns stored records into response objects.
///
/// Every model field is included. Foreign keys and one-to-one fields become
/// `{id, value}` with the related row's display, many-to-many fields a list
/// of primary keys, and files the absolute URL under `media_base`.
#[derive(Debug, Clone, Copy)]
pub struct RecordSerializer<'a> {
    ctx: QueryContext<'a>,
    media_base: &'a str,
}

impl<'a> RecordSerializer<'a> {
    /// `media_base` is the absolute media URL, e.g.
    /// `"http://localhost/media/"`.
    pub const fn new(ctx: QueryContext<'a>, media_base: &'a str) -> Self {
        Self { ctx, media_base }
    }

    pub fn to_representation(&self, meta: &ModelMeta, record: &Record) -> Value {
        let mut out = Map::new();
        for field in &meta.fields {
            let raw = record.get(field.name).cloned().unwrap_or(Value::Null);
            let value = if raw.is_null() {
                Value::Null
            } else {
                match &field.field_type {
                    FieldType::ForeignKey { .. } | FieldType::OneToOneField { .. } => {
                        self.related(field.related_model(), raw)
                    }
                    FieldType::ManyToManyField { .. } => match raw {
                        Value::Array(items) => Value::Array(items),
                        other => json!([other]),
                    },
                    FieldType::FileField { .. } | FieldType::ImageField { .. } => {
                        match raw.as_str() {
                            Some("") => Value::Null,
                            Some(name) => Value::String(format!("{}{name}", self.media_base)),
                            None => raw,
                        }
                    }
                    _ => raw,
                }
            };
            out.insert(field.name.to_string(), value);
        }
        Value::Object(out)
    }

    fn related(&self, label: Option<&str>, raw: Value) -> Value {
        let display = raw.as_i64().and_then(|pk| {
            let model = self.ctx.registry.get_by_label(label?)?;
            self.ctx.tables.get(&model, pk).map(|row| model.str(row))
        });
        json!({ "id": raw, "value": display })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_mis_db::{FieldDef, ModelRegistry, OnDelete, Store};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_representation() {
        let mut registry = ModelRegistry::new();
        let tag = registry.register(
            ModelMeta::new("shop", "Tag")
                .field(FieldDef::new("name", FieldType::CharField).max_length(10))
                .display(|r| r.get("name").and_then(Value::as_str).unwrap_or_default().to_string()),
        );
        let item = registry.register(
            ModelMeta::new("shop", "Item")
                .field(FieldDef::new(
                    "tag",
                    FieldType::ForeignKey {
                        to: "shop.tag".into(),
                        on_delete: OnDelete::Cascade,
                        related_name: None,
                    },
                ))
                .field(
                    FieldDef::new(
                        "owner",
                        FieldType::ForeignKey {
                            to: "shop.tag".into(),
                            on_delete: OnDelete::SetNull,
                            related_name: Some("owned".into()),
                        },
                    )
                    .nullable(),
                )
                .field(
                    FieldDef::new(
                        "tags",
                        FieldType::ManyToManyField {
                            to: "shop.tag".into(),
                            related_name: None,
                        },
                    )
                    .blank(),
                )
                .field(
                    FieldDef::new(
                        "photo",
                        FieldType::ImageField {
                            upload_to: "img/".into(),
                        },
                    )
                    .blank(),
                )
                .field(
                    FieldDef::new(
                        "manual",
                        FieldType::FileField {
                            upload_to: String::new(),
                        },
                    )
                    .blank(),
                ),
        );
        let registry = Arc::new(registry);
        let store = Store::new(Arc::clone(&registry));
        store.seed(&tag, vec![json!({"name": "red"})]).await.unwrap();
        store
            .seed(
                &item,
                vec![json!({
                    "tag": 1,
                    "owner": null,
                    "tags": [1],
                    "photo": "img/a.png",
                    "manual": "",
                })],
            )
            .await
            .unwrap();
        let tables = store.read().await;
        let ctx = QueryContext {
            registry: &registry,
            tables: &tables,
        };
        let serializer = RecordSerializer::new(ctx, "http://testserver/media/");
        let record = tables.get(&item, 1).unwrap();
        assert_eq!(
            serializer.to_representation(&item, record),
            json!({
                "id": 1,
                "tag": {"id": 1, "value": "red"},
                "owner": null,
                "tags": [1],
                "photo": "http://testserver/media/img/a.png",
                "manual": null,
            })
        );
    }
}
