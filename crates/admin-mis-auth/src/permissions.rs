//! Permissions and groups.
//!
//! Users can hold:
//!
//! - **Direct permissions** assigned to their account
//! - **Group permissions** inherited from groups they belong to
//! - **Superuser access** which grants all permissions unconditionally
//!
//! Permissions use the format `"app_label.codename"` (e.g. `"shop.add_order"`).
//! Inactive users have no permissions at all.

use std::collections::HashSet;

use admin_mis_core::GroupSettings;
use serde::{Deserialize, Serialize};

use crate::user::User;

/// A single permission, identified by a codename within an app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Permission {
    /// The machine-readable identifier (e.g. "`add_order`").
    pub codename: String,
    /// The human-readable name (e.g. "Can add order").
    pub name: String,
    pub app_label: String,
}

impl Permission {
    pub fn new(
        codename: impl Into<String>,
        name: impl Into<String>,
        app_label: impl Into<String>,
    ) -> Self {
        Self {
            codename: codename.into(),
            name: name.into(),
            app_label: app_label.into(),
        }
    }

    /// Parses `"app_label.codename"`.
    pub fn parse(full: &str) -> Option<Self> {
        let (app_label, codename) = full.split_once('.')?;
        Some(Self::new(codename, codename.replace('_', " "), app_label))
    }

    /// Returns `"app_label.codename"`.
    pub fn full_codename(&self) -> String {
        format!("{}.{}", self.app_label, self.codename)
    }
}

/// A named set of permissions shared by its members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub permissions: Vec<Permission>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions: Vec::new(),
        }
    }

    /// Builds a group from its settings entry, skipping malformed names.
    pub fn from_settings(settings: &GroupSettings) -> Self {
        let mut group = Self::new(settings.name.clone());
        for perm in &settings.permissions {
            if !group.add_permission_str(perm) {
                tracing::warn!(
                    group = %settings.name,
                    permission = %perm,
                    "ignoring malformed permission"
                );
            }
        }
        group
    }

    pub fn add_permission(&mut self, permission: Permission) {
        if !self.permissions.contains(&permission) {
            self.permissions.push(permission);
        }
    }

    /// Adds a permission given as `"app_label.codename"`. Returns `false` when
    /// the string has no app label.
    pub fn add_permission_str(&mut self, full: &str) -> bool {
        match Permission::parse(full) {
            Some(permission) => {
                self.add_permission(permission);
                true
            }
            None => false,
        }
    }

    /// Returns all permission codenames in `"app_label.codename"` format.
    pub fn get_permissions(&self) -> HashSet<String> {
        self.permissions
            .iter()
            .map(Permission::full_codename)
            .collect()
    }
}

/// Returns all permissions for a user (direct + group permissions).
pub fn get_all_permissions(user: &User) -> HashSet<String> {
    if !user.is_active {
        return HashSet::new();
    }
    user.user_permissions
        .iter()
        .cloned()
        .chain(user.group_permissions.iter().cloned())
        .collect()
}

/// Checks if a user has a specific permission.
pub fn has_perm(user: &User, perm: &str) -> bool {
    if !user.is_active {
        return false;
    }
    if user.is_superuser {
        return true;
    }
    user.user_permissions.iter().any(|p| p == perm) || user.group_permissions.contains(perm)
}

/// Checks if a user has all of the given permissions.
pub fn has_perms(user: &User, perms: &[&str]) -> bool {
    perms.iter().all(|p| has_perm(user, p))
}

/// Checks if a user has any permission within `app_label`.
pub fn has_module_perms(user: &User, app_label: &str) -> bool {
    if !user.is_active {
        return false;
    }
    if user.is_superuser {
        return true;
    }
    let prefix = format!("{app_label}.");
    get_all_permissions(user)
        .iter()
        .any(|p| p.starts_with(&prefix))
}

/// Returns the codename for `action` on a model, e.g. `"change_order"`.
pub fn get_permission_codename(action: &str, model_name: &str) -> String {
    format!("{action}_{model_name}")
}

/// Generates the default permissions for a model (add, change, delete, view).
pub fn generate_default_permissions(
    app_label: &str,
    model_name: &str,
    verbose_name: &str,
) -> Vec<Permission> {
    ["add", "change", "delete", "view"]
        .into_iter()
        .map(|action| {
            Permission::new(
                get_permission_codename(action, model_name),
                format!("Can {action} {verbose_name}"),
                app_label,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superuser_has_everything() {
        let user = User::new(1, "root").superuser();
        assert!(has_perm(&user, "shop.delete_order"));
        assert!(has_module_perms(&user, "anything"));
    }

    #[test]
    fn test_inactive_has_nothing() {
        let user = User::new(1, "root").superuser().inactive();
        assert!(!has_perm(&user, "shop.view_order"));
        assert!(get_all_permissions(&user).is_empty());
    }

    #[test]
    fn test_direct_and_group_permissions() {
        let mut group = Group::new("clerks");
        group.add_permission_str("shop.change_order");
        let mut user = User::new(2, "ann").with_perm("shop.view_order");
        user.groups.push("clerks".into());
        user.resolve_groups(&[group]);

        assert!(has_perms(&user, &["shop.view_order", "shop.change_order"]));
        assert!(!has_perm(&user, "shop.delete_order"));
        assert!(has_module_perms(&user, "shop"));
        assert!(!has_module_perms(&user, "blog"));
    }

    #[test]
    fn test_group_from_settings_skips_malformed() {
        let group = Group::from_settings(&GroupSettings {
            name: "g".into(),
            permissions: vec!["shop.view_order".into(), "nodot".into()],
        });
        assert_eq!(group.permissions.len(), 1);
    }

    #[test]
    fn test_generate_default_permissions() {
        let perms = generate_default_permissions("shop", "order", "order");
        let names: Vec<String> = perms.iter().map(Permission::full_codename).collect();
        assert_eq!(
            names,
            [
                "shop.add_order",
                "shop.change_order",
                "shop.delete_order",
                "shop.view_order"
            ]
        );
        assert_eq!(perms[0].name, "Can add order");
    }
}
