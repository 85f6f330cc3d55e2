//! Bulk actions run over selected rows of the change list.
//!
//! An [`AdminAction`] receives an [`ActionContext`] holding the open write
//! transaction, the selected primary keys and the message queue. The
//! built-in [`DeleteSelectedAction`] is registered on every admin by
//! default; custom actions either implement the trait or wrap a plain
//! function in [`FnAction`].

use std::fmt;
use std::sync::Arc;

use admin_mis_auth::User;
use admin_mis_core::{MisError, MisResult};
use admin_mis_db::{ModelMeta, QueryContext, Transaction};
use async_trait::async_trait;

use crate::deleted_objects::get_deleted_objects;
use crate::messages::Messages;
use crate::model_admin::ModelAdmin;
use crate::permissions::{check, PermissionKind};
use crate::site::AdminSite;
use crate::utils::model_ngettext;

/// Everything an action may read or change.
pub struct ActionContext<'a> {
    pub site: &'a AdminSite,
    pub model_admin: &'a ModelAdmin,
    pub user: &'a User,
    /// All writes go through this transaction; it commits when the action
    /// returns `Ok`.
    pub txn: &'a mut Transaction,
    /// Primary keys of the selected rows that exist.
    pub selected: Vec<i64>,
    pub messages: &'a mut Messages,
}

impl ActionContext<'_> {
    pub fn meta(&self) -> &Arc<ModelMeta> {
        &self.model_admin.meta
    }

    /// Read access to the transaction's working copy.
    pub fn query(&self) -> QueryContext<'_> {
        QueryContext {
            registry: self.site.registry(),
            tables: &**self.txn,
        }
    }
}

impl fmt::Debug for ActionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("model", &self.model_admin.model_key())
            .field("user", &self.user.username)
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

/// A bulk operation on selected rows.
///
/// # Examples
///
/// ```
/// use admin_mis_admin::actions::{ActionContext, AdminAction};
/// use admin_mis_core::MisResult;
/// use async_trait::async_trait;
///
/// struct CountSelected;
///
/// #[async_trait]
/// impl AdminAction for CountSelected {
///     fn name(&self) -> &str { "count_selected" }
///     fn description(&self) -> &str { "Count selected %(verbose_name_plural)s" }
///     async fn execute(&self, ctx: &mut ActionContext<'_>) -> MisResult<()> {
///         let n = ctx.selected.len();
///         ctx.messages.info(format!("{n} selected."));
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait AdminAction: Send + Sync {
    /// Identifier sent by clients in the `action` field.
    fn name(&self) -> &str;

    /// Label shown to users; `%(verbose_name_plural)s` is replaced with the
    /// model's plural name.
    fn description(&self) -> &str;

    /// Permissions the user must all hold for the action to be offered.
    fn allowed_permissions(&self) -> &[PermissionKind] {
        &[]
    }

    /// Runs the action.
    ///
    /// # Errors
    ///
    /// Any error rolls the transaction back.
    async fn execute(&self, ctx: &mut ActionContext<'_>) -> MisResult<()>;
}

/// Deletes the selected rows and everything they cascade to.
///
/// Nothing is deleted when a protected relation blocks the delete; the
/// reason is reported as an error message instead.
#[derive(Debug)]
pub struct DeleteSelectedAction;

#[async_trait]
impl AdminAction for DeleteSelectedAction {
    fn name(&self) -> &'static str {
        "delete_selected"
    }

    fn description(&self) -> &'static str {
        "Delete selected %(verbose_name_plural)s"
    }

    fn allowed_permissions(&self) -> &[PermissionKind] {
        &[PermissionKind::Delete]
    }

    async fn execute(&self, ctx: &mut ActionContext<'_>) -> MisResult<()> {
        let meta = Arc::clone(ctx.meta());
        let summary = get_deleted_objects(ctx.site, ctx.user, ctx.query(), &meta, &ctx.selected);
        let n = ctx.selected.len();

        if !summary.protected.is_empty() {
            ctx.messages.error(format!(
                "Deleting the selected {} would require deleting the following protected \
                 related objects: {}",
                model_ngettext(&meta, n),
                summary.protected.join(", ")
            ));
            return Ok(());
        }
        if !summary.perms_needed.is_empty() {
            return Err(MisError::PermissionDenied(format!(
                "Missing delete permission for: {}",
                summary.perms_needed.iter().cloned().collect::<Vec<_>>().join(", ")
            )));
        }

        let entries: Vec<(String, String)> = ctx
            .selected
            .iter()
            .filter_map(|&pk| ctx.txn.get(&meta, pk).map(|r| (pk.to_string(), meta.str(r))))
            .collect();
        let log = Arc::clone(ctx.site.log_store());
        let user_id = ctx.user.id;
        let content_type = meta.label_lower();
        ctx.txn.on_commit(move || {
            for (object_id, repr) in &entries {
                log.log_deletion(user_id, &content_type, object_id, repr);
            }
        });

        summary.plan.apply(&mut **ctx.txn);
        tracing::info!(model = %meta.label_lower(), count = n, "deleted selected rows");
        ctx.messages.success(format!(
            "Successfully deleted {n} {}.",
            model_ngettext(&meta, n)
        ));
        Ok(())
    }
}

/// Signature of a function-based action.
pub type ActionFn = fn(&mut ActionContext<'_>) -> MisResult<()>;

/// Wraps a plain function as an action.
pub struct FnAction {
    name: String,
    description: String,
    permissions: Vec<PermissionKind>,
    func: ActionFn,
}

impl FnAction {
    pub fn new(name: &str, description: &str, func: ActionFn) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            permissions: Vec::new(),
            func,
        }
    }

    #[must_use]
    pub fn permissions(mut self, permissions: &[PermissionKind]) -> Self {
        self.permissions = permissions.to_vec();
        self
    }
}

impl fmt::Debug for FnAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction")
            .field("name", &self.name)
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AdminAction for FnAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn allowed_permissions(&self) -> &[PermissionKind] {
        &self.permissions
    }

    async fn execute(&self, ctx: &mut ActionContext<'_>) -> MisResult<()> {
        (self.func)(ctx)
    }
}

/// The actions available on one admin.
#[derive(Default)]
pub struct ActionRegistry {
    actions: Vec<Box<dyn AdminAction>>,
}

impl ActionRegistry {
    /// A registry holding `delete_selected`.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(DeleteSelectedAction));
        registry
    }

    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
        }
    }

    /// Adds an action, replacing any action with the same name.
    pub fn register(&mut self, action: Box<dyn AdminAction>) {
        match self.actions.iter().position(|a| a.name() == action.name()) {
            Some(index) => self.actions[index] = action,
            None => self.actions.push(action),
        }
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn AdminAction> {
        self.actions
            .iter()
            .find(|a| a.name() == name)
            .map(|a| &**a)
    }

    /// Actions whose required permissions `user` holds on `admin`'s model.
    pub fn allowed<'a>(&'a self, admin: &ModelAdmin, user: &User) -> Vec<&'a dyn AdminAction> {
        self.actions
            .iter()
            .filter(|a| {
                a.allowed_permissions()
                    .iter()
                    .all(|&kind| check(admin.policy.as_ref(), kind, user, &admin.meta, None))
            })
            .map(|a| &**a)
            .collect()
    }
}

/// An action's description with the model's plural name filled in.
pub fn describe(action: &dyn AdminAction, meta: &ModelMeta) -> String {
    action
        .description()
        .replace("%(verbose_name_plural)s", &meta.verbose_name_plural)
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.action_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_mis_core::Settings;
    use admin_mis_db::{FieldDef, FieldType, ModelRegistry, Store};
    use serde_json::{json, Value};

    fn mark_done(ctx: &mut ActionContext<'_>) -> MisResult<()> {
        let meta = Arc::clone(ctx.meta());
        for &pk in &ctx.selected {
            ctx.txn.set_field(&meta, pk, "done", Value::Bool(true));
        }
        ctx.messages.success(format!("{} marked.", ctx.selected.len()));
        Ok(())
    }

    async fn site() -> AdminSite {
        let mut registry = ModelRegistry::new();
        let task = registry.register(
            ModelMeta::new("todo", "Task")
                .field(FieldDef::new("title", FieldType::CharField).max_length(50))
                .field(FieldDef::new("done", FieldType::BooleanField).default(false)),
        );
        let store = Store::new(Arc::new(registry));
        store
            .seed(
                &task,
                vec![
                    json!({"title": "a", "done": false}),
                    json!({"title": "b", "done": false}),
                ],
            )
            .await
            .unwrap();
        let mut site = AdminSite::new(Settings::default(), store);
        site.register(
            ModelAdmin::new(task).action(Box::new(
                FnAction::new("mark_done", "Mark %(verbose_name_plural)s done", mark_done)
                    .permissions(&[PermissionKind::Change]),
            )),
        )
        .unwrap();
        site
    }

    #[test]
    fn test_registry_defaults() {
        let registry = ActionRegistry::new();
        assert_eq!(registry.action_names(), vec!["delete_selected"]);
        assert!(registry.get("delete_selected").is_some());
        assert!(registry.get("missing").is_none());
        assert!(ActionRegistry::empty().action_names().is_empty());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ActionRegistry::new();
        registry.register(Box::new(FnAction::new("delete_selected", "Remove", |_| Ok(()))));
        assert_eq!(registry.action_names(), vec!["delete_selected"]);
        assert_eq!(registry.get("delete_selected").unwrap().description(), "Remove");
    }

    #[tokio::test]
    async fn test_allowed_filters_by_permission() {
        let site = site().await;
        let admin = site.get_admin("todo.task").unwrap();
        let viewer = User::new(1, "viewer").with_perm("todo.view_task");
        assert!(admin.actions.allowed(admin, &viewer).is_empty());

        let editor = User::new(2, "editor").with_perm("todo.change_task");
        let names: Vec<&str> = admin
            .actions
            .allowed(admin, &editor)
            .iter()
            .map(|a| a.name())
            .collect();
        assert_eq!(names, vec!["mark_done"]);
        assert_eq!(
            describe(admin.actions.get("mark_done").unwrap(), &admin.meta),
            "Mark tasks done"
        );
    }

    #[tokio::test]
    async fn test_fn_action_runs_in_transaction() {
        let site = site().await;
        let admin = site.get_admin("todo.task").unwrap();
        let user = User::new(1, "root").superuser();
        let mut txn = site.store().begin().await;
        let mut messages = Messages::new();
        let mut ctx = ActionContext {
            site: &site,
            model_admin: admin,
            user: &user,
            txn: &mut txn,
            selected: vec![1],
            messages: &mut messages,
        };
        admin.actions.get("mark_done").unwrap().execute(&mut ctx).await.unwrap();
        txn.commit();

        let tables = site.store().read().await;
        assert_eq!(tables.get(&admin.meta, 1).unwrap()["done"], json!(true));
        assert_eq!(tables.get(&admin.meta, 2).unwrap()["done"], json!(false));
        assert_eq!(messages.into_payload()[0].message_content, "1 marked.");
    }

    #[tokio::test]
    async fn test_delete_selected() {
        let site = site().await;
        let admin = site.get_admin("todo.task").unwrap();
        let user = User::new(1, "root").superuser();
        let mut txn = site.store().begin().await;
        let mut messages = Messages::new();
        let mut ctx = ActionContext {
            site: &site,
            model_admin: admin,
            user: &user,
            txn: &mut txn,
            selected: vec![1, 2],
            messages: &mut messages,
        };
        DeleteSelectedAction.execute(&mut ctx).await.unwrap();
        txn.commit();

        assert_eq!(site.store().read().await.count(&admin.meta), 0);
        assert_eq!(site.log_store().count(), 2);
        let payload = messages.into_payload();
        assert_eq!(payload[0].message_content, "Successfully deleted 2 tasks.");
        assert_eq!(payload[0].message_level, "Success");
    }
}
