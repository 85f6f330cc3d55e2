//! Cascade collection for deletes.
//!
//! [`Collector::collect`] walks reverse relations from the rows being deleted
//! and works out what else a delete touches: cascaded rows, protected rows
//! that block the delete, foreign keys to null out or reset, and
//! many-to-many references to drop. [`DeletionPlan::apply`] then performs it
//! inside a transaction.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::fields::{FieldType, OnDelete};
use crate::model::ModelMeta;
use crate::query::QueryContext;
use crate::store::Tables;

/// A row that will be deleted, with the rows its deletion cascades to.
#[derive(Debug, Clone)]
pub struct DeletedNode {
    pub model: Arc<ModelMeta>,
    pub pk: i64,
    pub children: Vec<DeletedNode>,
}

/// A row whose `PROTECT` relation blocks the delete.
#[derive(Debug, Clone)]
pub struct ProtectedRow {
    pub model: Arc<ModelMeta>,
    pub pk: i64,
}

#[derive(Debug, Clone)]
struct FieldUpdate {
    model: Arc<ModelMeta>,
    pk: i64,
    field: &'static str,
    value: Value,
}

#[derive(Debug, Clone)]
struct M2mRemoval {
    model: Arc<ModelMeta>,
    pk: i64,
    field: &'static str,
    target: i64,
}

/// Everything a delete would do.
#[derive(Debug, Clone, Default)]
pub struct DeletionPlan {
    /// One tree per requested row.
    pub roots: Vec<DeletedNode>,
    pub protected: Vec<ProtectedRow>,
    updates: Vec<FieldUpdate>,
    m2m_removals: Vec<M2mRemoval>,
}

impl DeletionPlan {
    /// Every row to delete, parents before children.
    pub fn deleted(&self) -> Vec<&DeletedNode> {
        fn walk<'a>(node: &'a DeletedNode, out: &mut Vec<&'a DeletedNode>) {
            out.push(node);
            for child in &node.children {
                walk(child, out);
            }
        }
        let mut out = Vec::new();
        for root in &self.roots {
            walk(root, &mut out);
        }
        out
    }

    pub fn is_protected(&self) -> bool {
        !self.protected.is_empty()
    }

    /// Performs the delete. Children are removed before their parents.
    pub fn apply(&self, tables: &mut Tables) {
        for update in &self.updates {
            tables.set_field(&update.model, update.pk, update.field, update.value.clone());
        }
        for removal in &self.m2m_removals {
            let Some(record) = tables.get(&removal.model, removal.pk) else {
                continue;
            };
            let kept: Vec<Value> = record
                .get(removal.field)
                .and_then(Value::as_array)
                .map(|ids| {
                    ids.iter()
                        .filter(|id| id.as_i64() != Some(removal.target))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            tables.set_field(&removal.model, removal.pk, removal.field, Value::Array(kept));
        }
        for node in self.deleted().into_iter().rev() {
            tables.remove(&node.model, node.pk);
        }
    }
}

/// Builds a [`DeletionPlan`] by following reverse relations.
#[derive(Debug)]
pub struct Collector<'a> {
    ctx: QueryContext<'a>,
    seen: HashSet<(String, i64)>,
    plan: DeletionPlan,
}

impl<'a> Collector<'a> {
    pub fn new(ctx: QueryContext<'a>) -> Self {
        Self {
            ctx,
            seen: HashSet::new(),
            plan: DeletionPlan::default(),
        }
    }

    /// Collects the effects of deleting `pks` of `model`.
    pub fn collect(mut self, model: &Arc<ModelMeta>, pks: &[i64]) -> DeletionPlan {
        for &pk in pks {
            if let Some(node) = self.visit(model, pk) {
                self.plan.roots.push(node);
            }
        }
        self.plan
    }

    fn visit(&mut self, model: &Arc<ModelMeta>, pk: i64) -> Option<DeletedNode> {
        if !self.seen.insert((model.label_lower(), pk)) {
            return None;
        }
        let mut node = DeletedNode {
            model: Arc::clone(model),
            pk,
            children: Vec::new(),
        };
        for related in self.ctx.registry.related_objects(model) {
            let field = related.field();
            let rows: Vec<i64> = self
                .ctx
                .tables
                .all(&related.model)
                .into_iter()
                .filter(|row| references(row.get(field.name), pk))
                .filter_map(|row| related.model.pk_of(row))
                .collect();
            for row_pk in rows {
                if let FieldType::ManyToManyField { .. } = field.field_type {
                    self.plan.m2m_removals.push(M2mRemoval {
                        model: Arc::clone(&related.model),
                        pk: row_pk,
                        field: field.name,
                        target: pk,
                    });
                    continue;
                }
                match field.on_delete().unwrap_or(OnDelete::DoNothing) {
                    OnDelete::Cascade => {
                        if let Some(child) = self.visit(&related.model, row_pk) {
                            node.children.push(child);
                        }
                    }
                    OnDelete::Protect => self.plan.protected.push(ProtectedRow {
                        model: Arc::clone(&related.model),
                        pk: row_pk,
                    }),
                    OnDelete::SetNull => self.plan.updates.push(FieldUpdate {
                        model: Arc::clone(&related.model),
                        pk: row_pk,
                        field: field.name,
                        value: Value::Null,
                    }),
                    OnDelete::SetDefault => self.plan.updates.push(FieldUpdate {
                        model: Arc::clone(&related.model),
                        pk: row_pk,
                        field: field.name,
                        value: field.default_value().unwrap_or(Value::Null),
                    }),
                    OnDelete::DoNothing => {}
                }
            }
        }
        Some(node)
    }
}

fn references(value: Option<&Value>, pk: i64) -> bool {
    match value {
        Some(Value::Array(ids)) => ids.iter().any(|id| id.as_i64() == Some(pk)),
        Some(v) => v.as_i64() == Some(pk),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldDef;
    use crate::model::ModelRegistry;
    use crate::store::Store;
    use serde_json::json;

    fn fk(name: &'static str, to: &str, on_delete: OnDelete) -> FieldDef {
        FieldDef::new(
            name,
            FieldType::ForeignKey {
                to: to.into(),
                on_delete,
                related_name: None,
            },
        )
        .nullable()
    }

    async fn setup() -> (Store, Arc<ModelMeta>, Arc<ModelMeta>, Arc<ModelMeta>, Arc<ModelMeta>) {
        let mut registry = ModelRegistry::new();
        let author = registry.register(ModelMeta::new("lib", "Author"));
        let book = registry.register(
            ModelMeta::new("lib", "Book")
                .field(fk("author", "lib.author", OnDelete::Cascade))
                .field(FieldDef::new(
                    "tags",
                    FieldType::ManyToManyField {
                        to: "lib.author".into(),
                        related_name: Some("tagged".into()),
                    },
                )),
        );
        let review = registry.register(
            ModelMeta::new("lib", "Review").field(fk("book", "lib.book", OnDelete::Cascade)),
        );
        let loan = registry.register(
            ModelMeta::new("lib", "Loan")
                .field(fk("book", "lib.book", OnDelete::Protect))
                .field(fk("author", "lib.author", OnDelete::SetNull)),
        );
        let store = Store::new(Arc::new(registry));
        store.seed(&author, [json!({}), json!({})]).await.unwrap();
        store
            .seed(
                &book,
                [
                    json!({"author": 1, "tags": [2]}),
                    json!({"author": 2, "tags": [1, 2]}),
                ],
            )
            .await
            .unwrap();
        store.seed(&review, [json!({"book": 1})]).await.unwrap();
        store.seed(&loan, [json!({"book": 2, "author": 1})]).await.unwrap();
        (store, author, book, review, loan)
    }

    #[tokio::test]
    async fn test_cascade_tree() {
        let (store, author, ..) = setup().await;
        let tables = store.read().await;
        let ctx = QueryContext {
            registry: store.registry(),
            tables: &tables,
        };
        let plan = Collector::new(ctx).collect(&author, &[1]);
        assert!(!plan.is_protected());
        let labels: Vec<String> = plan
            .deleted()
            .iter()
            .map(|n| format!("{}:{}", n.model.model_name, n.pk))
            .collect();
        assert_eq!(labels, ["author:1", "book:1", "review:1"]);
    }

    #[tokio::test]
    async fn test_protected_blocks() {
        let (store, author, ..) = setup().await;
        let tables = store.read().await;
        let ctx = QueryContext {
            registry: store.registry(),
            tables: &tables,
        };
        let plan = Collector::new(ctx).collect(&author, &[2]);
        assert!(plan.is_protected());
        assert_eq!(plan.protected[0].model.model_name, "loan");
    }

    #[tokio::test]
    async fn test_apply_updates_and_m2m() {
        let (store, author, book, review, loan) = setup().await;
        let plan = {
            let tables = store.read().await;
            let ctx = QueryContext {
                registry: store.registry(),
                tables: &tables,
            };
            Collector::new(ctx).collect(&author, &[1])
        };
        let mut txn = store.begin().await;
        plan.apply(&mut txn);
        txn.commit();

        let tables = store.read().await;
        assert!(tables.get(&author, 1).is_none());
        assert!(tables.get(&book, 1).is_none());
        assert!(tables.get(&review, 1).is_none());
        assert_eq!(tables.get(&book, 2).unwrap()["tags"], json!([2]));
        assert_eq!(tables.get(&loan, 1).unwrap()["author"], Value::Null);
    }
}
