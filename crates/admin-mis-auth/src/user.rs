//! The authenticated API user.

use std::collections::HashSet;

use admin_mis_core::UserSettings;
use serde::{Deserialize, Serialize};

use crate::permissions::Group;

/// An API account.
///
/// `group_permissions` holds the permissions inherited from `groups`; it is
/// filled by [`User::resolve_groups`] when the user is loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    /// Permissions assigned directly, as `"app_label.codename"`.
    pub user_permissions: Vec<String>,
    /// Names of the groups this user belongs to.
    pub groups: Vec<String>,
    #[serde(skip)]
    pub group_permissions: HashSet<String>,
}

impl User {
    /// Creates an active user with no permissions.
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            is_active: true,
            ..Self::default()
        }
    }

    /// Builds a user from its settings entry.
    pub fn from_settings(id: i64, settings: &UserSettings) -> Self {
        Self {
            id,
            username: settings.username.clone(),
            is_active: settings.is_active,
            is_staff: settings.is_staff,
            is_superuser: settings.is_superuser,
            user_permissions: settings.permissions.clone(),
            groups: settings.groups.clone(),
            group_permissions: HashSet::new(),
        }
    }

    #[must_use]
    pub const fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self.is_staff = true;
        self
    }

    #[must_use]
    pub const fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Grants a permission directly.
    #[must_use]
    pub fn with_perm(mut self, perm: impl Into<String>) -> Self {
        self.user_permissions.push(perm.into());
        self
    }

    #[must_use]
    pub fn with_perms(mut self, perms: &[&str]) -> Self {
        self.user_permissions
            .extend(perms.iter().map(ToString::to_string));
        self
    }

    /// Collects the permissions of the groups this user belongs to.
    pub fn resolve_groups(&mut self, groups: &[Group]) {
        self.group_permissions = groups
            .iter()
            .filter(|g| self.groups.contains(&g.name))
            .flat_map(Group::get_permissions)
            .collect();
    }

    /// Always `true`; anonymous requests never produce a `User`.
    pub const fn is_authenticated(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_settings() {
        let settings = UserSettings {
            username: "ann".into(),
            token: "t".into(),
            permissions: vec!["shop.view_order".into()],
            ..UserSettings::default()
        };
        let user = User::from_settings(4, &settings);
        assert_eq!(user.id, 4);
        assert!(user.is_active);
        assert_eq!(user.user_permissions, vec!["shop.view_order"]);
    }

    #[test]
    fn test_resolve_groups() {
        let mut editors = Group::new("editors");
        editors.add_permission_str("shop.change_order");
        let mut user = User::new(1, "bob");
        user.groups.push("editors".into());
        user.resolve_groups(&[editors, Group::new("other")]);
        assert!(user.group_permissions.contains("shop.change_order"));
    }
}
