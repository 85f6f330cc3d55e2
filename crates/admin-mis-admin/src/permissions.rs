//! Model-level permission checks.
//!
//! Each HTTP method maps to one admin permission; [`PermissionPolicy`]
//! answers whether a user holds it for a model (and optionally one row).

use std::fmt;

use admin_mis_auth::permissions::get_permission_codename;
use admin_mis_auth::{has_module_perms, has_perm, User};
use admin_mis_db::{ModelMeta, Record};
use axum::http::Method;
use serde::Serialize;

use crate::error::ApiError;

/// One of the four standard model permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionKind {
    View,
    Add,
    Change,
    Delete,
}

impl PermissionKind {
    /// The permission an HTTP method requires.
    ///
    /// # Errors
    ///
    /// Methods outside the map are rejected with 405.
    pub fn for_method(method: &Method) -> Result<Self, ApiError> {
        match *method {
            Method::GET | Method::HEAD | Method::OPTIONS => Ok(Self::View),
            Method::POST => Ok(Self::Add),
            Method::PUT | Method::PATCH => Ok(Self::Change),
            Method::DELETE => Ok(Self::Delete),
            _ => Err(ApiError::MethodNotAllowed(method.to_string())),
        }
    }

    pub const fn action(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Add => "add",
            Self::Change => "change",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.action())
    }
}

/// The `perms` object attached to responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModelPerms {
    pub add: bool,
    pub change: bool,
    pub delete: bool,
    pub view: bool,
}

impl ModelPerms {
    pub const fn any(&self) -> bool {
        self.add || self.change || self.delete || self.view
    }
}

/// Decides what a user may do with a model.
///
/// The provided methods follow the standard codename rules
/// (`"{app}.{action}_{model}"`); implementors override them to restrict
/// access further, e.g. per row.
pub trait PermissionPolicy: Send + Sync + fmt::Debug {
    fn has_module_permission(&self, user: &User, app_label: &str) -> bool {
        has_module_perms(user, app_label)
    }

    fn has_add_permission(&self, user: &User, meta: &ModelMeta) -> bool {
        has_codename(user, meta, PermissionKind::Add)
    }

    fn has_change_permission(&self, user: &User, meta: &ModelMeta, _obj: Option<&Record>) -> bool {
        has_codename(user, meta, PermissionKind::Change)
    }

    fn has_delete_permission(&self, user: &User, meta: &ModelMeta, _obj: Option<&Record>) -> bool {
        has_codename(user, meta, PermissionKind::Delete)
    }

    /// Change permission implies view permission.
    fn has_view_permission(&self, user: &User, meta: &ModelMeta, obj: Option<&Record>) -> bool {
        has_codename(user, meta, PermissionKind::View)
            || self.has_change_permission(user, meta, obj)
    }
}

/// The default policy: codename permissions only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelPermissions;

impl PermissionPolicy for ModelPermissions {}

/// A policy that never allows writes, whatever the user holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnly;

impl PermissionPolicy for ReadOnly {
    fn has_add_permission(&self, _user: &User, _meta: &ModelMeta) -> bool {
        false
    }

    fn has_change_permission(
        &self,
        _user: &User,
        _meta: &ModelMeta,
        _obj: Option<&Record>,
    ) -> bool {
        false
    }

    fn has_delete_permission(
        &self,
        _user: &User,
        _meta: &ModelMeta,
        _obj: Option<&Record>,
    ) -> bool {
        false
    }
}

pub fn has_codename(user: &User, meta: &ModelMeta, kind: PermissionKind) -> bool {
    let codename = get_permission_codename(kind.action(), &meta.model_name);
    has_perm(user, &format!("{}.{codename}", meta.app_label))
}

/// Dispatches `kind` to the matching policy method.
pub fn check(
    policy: &dyn PermissionPolicy,
    kind: PermissionKind,
    user: &User,
    meta: &ModelMeta,
    obj: Option<&Record>,
) -> bool {
    match kind {
        PermissionKind::View => policy.has_view_permission(user, meta, obj),
        PermissionKind::Add => policy.has_add_permission(user, meta),
        PermissionKind::Change => policy.has_change_permission(user, meta, obj),
        PermissionKind::Delete => policy.has_delete_permission(user, meta, obj),
    }
}

/// The model-level `perms` of `user`.
pub fn model_perms(policy: &dyn PermissionPolicy, user: &User, meta: &ModelMeta) -> ModelPerms {
    ModelPerms {
        add: policy.has_add_permission(user, meta),
        change: policy.has_change_permission(user, meta, None),
        delete: policy.has_delete_permission(user, meta, None),
        view: policy.has_view_permission(user, meta, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_mis_db::fields::{FieldDef, FieldType};

    fn book() -> ModelMeta {
        ModelMeta::new("library", "Book")
            .field(FieldDef::new("title", FieldType::CharField).max_length(50))
    }

    #[test]
    fn test_method_map() {
        assert_eq!(PermissionKind::for_method(&Method::GET).unwrap(), PermissionKind::View);
        assert_eq!(PermissionKind::for_method(&Method::HEAD).unwrap(), PermissionKind::View);
        assert_eq!(PermissionKind::for_method(&Method::POST).unwrap(), PermissionKind::Add);
        assert_eq!(PermissionKind::for_method(&Method::PUT).unwrap(), PermissionKind::Change);
        assert_eq!(PermissionKind::for_method(&Method::PATCH).unwrap(), PermissionKind::Change);
        assert_eq!(PermissionKind::for_method(&Method::DELETE).unwrap(), PermissionKind::Delete);
        assert!(matches!(
            PermissionKind::for_method(&Method::TRACE),
            Err(ApiError::MethodNotAllowed(m)) if m == "TRACE"
        ));
    }

    #[test]
    fn test_change_implies_view() {
        let meta = book();
        let user = User::new(1, "editor").with_perm("library.change_book");
        let perms = model_perms(&ModelPermissions, &user, &meta);
        assert_eq!(
            perms,
            ModelPerms {
                add: false,
                change: true,
                delete: false,
                view: true
            }
        );
    }

    #[test]
    fn test_superuser_and_inactive() {
        let meta = book();
        let admin = User::new(1, "root").superuser();
        assert!(model_perms(&ModelPermissions, &admin, &meta).delete);
        let gone = User::new(2, "gone").superuser().inactive();
        assert!(!model_perms(&ModelPermissions, &gone, &meta).any());
        assert!(!ModelPermissions.has_module_permission(&gone, "library"));
    }

    #[test]
    fn test_read_only_policy() {
        let meta = book();
        let admin = User::new(1, "root").superuser();
        let perms = model_perms(&ReadOnly, &admin, &meta);
        assert!(perms.view);
        assert!(!perms.add && !perms.change && !perms.delete);
        assert!(check(&ReadOnly, PermissionKind::View, &admin, &meta, None));
        assert!(!check(&ReadOnly, PermissionKind::Delete, &admin, &meta, None));
    }
}
