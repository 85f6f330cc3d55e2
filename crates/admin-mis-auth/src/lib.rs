//! # admin-mis-auth
//!
//! Users, groups and permission checks for the admin API, plus the token
//! backend that authenticates requests.
//!
//! ## Modules
//!
//! - [`user`] - The [`User`] type
//! - [`permissions`] - Permissions, groups and the `has_perm` family
//! - [`backends`] - The [`AuthBackend`] trait and [`TokenBackend`]

pub mod backends;
pub mod permissions;
pub mod user;

pub use backends::{AuthBackend, TokenBackend};
pub use permissions::{has_module_perms, has_perm, has_perms, Group, Permission};
pub use user::User;
