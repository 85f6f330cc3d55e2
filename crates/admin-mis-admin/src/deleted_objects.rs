//! What deleting some rows would touch, in the shape shown to users before
//! they confirm.

use std::collections::BTreeSet;
use std::sync::Arc;

use admin_mis_auth::User;
use admin_mis_db::deletion::DeletedNode;
use admin_mis_db::model::capfirst;
use admin_mis_db::{Collector, DeletionPlan, ModelMeta, QueryContext};
use serde_json::{Map, Value};

use crate::site::AdminSite;

/// The outcome of collecting a delete.
#[derive(Debug)]
pub struct DeletedObjects {
    /// Nested list: each row's label followed by a list of what it cascades
    /// to, when anything.
    pub to_delete: Value,
    /// Plural verbose name to row count, in collection order.
    pub model_count: Map<String, Value>,
    /// Verbose names of registered models the user may not delete from.
    pub perms_needed: BTreeSet<String>,
    /// Labels of rows whose protected relations block the delete.
    pub protected: Vec<String>,
    pub plan: DeletionPlan,
}

impl DeletedObjects {
    /// Whether the delete may go ahead.
    pub fn is_allowed(&self) -> bool {
        self.perms_needed.is_empty() && self.protected.is_empty()
    }
}

/// Collects the delete of `pks` and checks the user's delete permission on
/// every affected registered model.
pub fn get_deleted_objects(
    site: &AdminSite,
    user: &User,
    ctx: QueryContext<'_>,
    model: &Arc<ModelMeta>,
    pks: &[i64],
) -> DeletedObjects {
    let plan = Collector::new(ctx).collect(model, pks);

    let mut perms_needed = BTreeSet::new();
    let mut model_count = Map::new();
    for node in plan.deleted() {
        let count = model_count
            .entry(node.model.verbose_name_plural.clone())
            .or_insert(Value::from(0));
        *count = Value::from(count.as_u64().unwrap_or(0) + 1);

        if let Some(admin) = site.get_admin(&node.model.label_lower()) {
            let record = ctx.tables.get(&node.model, node.pk);
            if !admin.has_delete_permission(user, record) {
                perms_needed.insert(node.model.verbose_name.clone());
            }
        }
    }

    let mut to_delete = Vec::new();
    for root in &plan.roots {
        nested(ctx, root, &mut to_delete);
    }
    let protected = plan
        .protected
        .iter()
        .map(|row| describe(ctx, &row.model, row.pk))
        .collect();

    DeletedObjects {
        to_delete: Value::Array(to_delete),
        model_count,
        perms_needed,
        protected,
        plan,
    }
}

fn nested(ctx: QueryContext<'_>, node: &DeletedNode, out: &mut Vec<Value>) {
    out.push(Value::String(describe(ctx, &node.model, node.pk)));
    let mut children = Vec::new();
    for child in &node.children {
        nested(ctx, child, &mut children);
    }
    if !children.is_empty() {
        out.push(Value::Array(children));
    }
}

/// `"Verbose name: display"` for one row.
fn describe(ctx: QueryContext<'_>, model: &ModelMeta, pk: i64) -> String {
    let display = ctx
        .tables
        .get(model, pk)
        .map_or_else(|| pk.to_string(), |record| model.str(record));
    format!("{}: {display}", capfirst(&model.verbose_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_mis_auth::User;
    use admin_mis_core::Settings;
    use admin_mis_db::{FieldDef, FieldType, ModelRegistry, OnDelete, Store};
    use serde_json::json;

    use crate::model_admin::ModelAdmin;

    fn display_name(record: &admin_mis_db::Record) -> String {
        record
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    async fn site(on_delete: OnDelete) -> (AdminSite, Arc<ModelMeta>) {
        let mut registry = ModelRegistry::new();
        let author = registry.register(
            ModelMeta::new("library", "Author")
                .field(FieldDef::new("name", FieldType::CharField).max_length(50))
                .display(display_name),
        );
        let book = registry.register(
            ModelMeta::new("library", "Book")
                .field(FieldDef::new("name", FieldType::CharField).max_length(50))
                .field(FieldDef::new(
                    "author",
                    FieldType::ForeignKey {
                        to: "library.author".into(),
                        on_delete,
                        related_name: None,
                    },
                ))
                .display(display_name),
        );
        let store = Store::new(Arc::new(registry));
        store
            .seed(&author, vec![json!({"name": "Herbert"})])
            .await
            .unwrap();
        store
            .seed(
                &book,
                vec![
                    json!({"name": "Dune", "author": 1}),
                    json!({"name": "Dune Messiah", "author": 1}),
                ],
            )
            .await
            .unwrap();
        let mut site = AdminSite::new(Settings::default(), store);
        site.register(ModelAdmin::new(Arc::clone(&author))).unwrap();
        site.register(ModelAdmin::new(book)).unwrap();
        (site, author)
    }

    #[tokio::test]
    async fn test_cascade_summary() {
        let (site, author) = site(OnDelete::Cascade).await;
        let tables = site.store().read().await;
        let ctx = QueryContext {
            registry: site.registry(),
            tables: &tables,
        };
        let root = User::new(1, "root").superuser();
        let summary = get_deleted_objects(&site, &root, ctx, &author, &[1]);
        assert!(summary.is_allowed());
        assert_eq!(
            summary.to_delete,
            json!(["Author: Herbert", ["Book: Dune", "Book: Dune Messiah"]])
        );
        assert_eq!(
            Value::Object(summary.model_count.clone()),
            json!({"authors": 1, "books": 2})
        );
    }

    #[tokio::test]
    async fn test_perms_needed_for_cascaded_models() {
        let (site, author) = site(OnDelete::Cascade).await;
        let tables = site.store().read().await;
        let ctx = QueryContext {
            registry: site.registry(),
            tables: &tables,
        };
        let user = User::new(2, "editor").with_perm("library.delete_author");
        let summary = get_deleted_objects(&site, &user, ctx, &author, &[1]);
        assert!(!summary.is_allowed());
        assert_eq!(summary.perms_needed.into_iter().collect::<Vec<_>>(), vec!["book"]);
    }

    #[tokio::test]
    async fn test_protected_rows() {
        let (site, author) = site(OnDelete::Protect).await;
        let tables = site.store().read().await;
        let ctx = QueryContext {
            registry: site.registry(),
            tables: &tables,
        };
        let root = User::new(1, "root").superuser();
        let summary = get_deleted_objects(&site, &root, ctx, &author, &[1]);
        assert!(!summary.is_allowed());
        assert_eq!(summary.protected.len(), 2);
        assert!(summary.protected.contains(&"Book: Dune".to_string()));
        assert_eq!(summary.to_delete, json!(["Author: Herbert"]));
    }
}
