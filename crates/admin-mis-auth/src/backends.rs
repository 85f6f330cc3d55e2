//! Authentication backends.
//!
//! A backend turns the request's `Authorization` header into a [`User`]. The
//! built-in [`TokenBackend`] accepts `Authorization: Token <key>` with keys
//! declared in settings.

use std::collections::HashMap;
use std::sync::Arc;

use admin_mis_core::{MisError, MisResult, Settings};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::permissions::Group;
use crate::user::User;

pub const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";
pub const INVALID_TOKEN: &str = "Invalid token.";

/// Pluggable request authentication.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Authenticates from the raw `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns [`MisError::Unauthorized`] with the client-facing message when
    /// the header is missing, malformed, or names no active user.
    async fn authenticate(&self, authorization: Option<&str>) -> MisResult<User>;
}

/// Token authentication against an in-memory key table.
#[derive(Debug, Clone, Default)]
pub struct TokenBackend {
    tokens: Arc<RwLock<HashMap<String, User>>>,
}

impl TokenBackend {
    pub const KEYWORD: &'static str = "Token";

    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every user declared in settings, resolving group permissions.
    pub fn from_settings(settings: &Settings) -> Self {
        let groups: Vec<Group> = settings.groups.iter().map(Group::from_settings).collect();
        let mut tokens = HashMap::new();
        for (idx, entry) in settings.users.iter().enumerate() {
            if entry.token.is_empty() {
                tracing::warn!(username = %entry.username, "user has no token; skipping");
                continue;
            }
            let id = i64::try_from(idx).unwrap_or(i64::MAX).saturating_add(1);
            let mut user = User::from_settings(id, entry);
            user.resolve_groups(&groups);
            tokens.insert(entry.token.clone(), user);
        }
        tracing::debug!(users = tokens.len(), "token backend loaded");
        Self {
            tokens: Arc::new(RwLock::new(tokens)),
        }
    }

    /// Registers (or replaces) the user for `token`.
    pub async fn add_user(&self, token: impl Into<String>, user: User) {
        self.tokens.write().await.insert(token.into(), user);
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.tokens.write().await.remove(token).is_some()
    }
}

#[async_trait]
impl AuthBackend for TokenBackend {
    async fn authenticate(&self, authorization: Option<&str>) -> MisResult<User> {
        let header = authorization.unwrap_or_default();
        let mut parts = header.split_whitespace();
        let keyword = parts.next();
        if !keyword.is_some_and(|k| k.eq_ignore_ascii_case(Self::KEYWORD)) {
            return Err(MisError::Unauthorized(NOT_AUTHENTICATED.to_string()));
        }
        let Some(key) = parts.next() else {
            return Err(MisError::Unauthorized(
                "Invalid token header. No credentials provided.".to_string(),
            ));
        };
        if parts.next().is_some() {
            return Err(MisError::Unauthorized(
                "Invalid token header. Token string should not contain spaces.".to_string(),
            ));
        }
        let user = self
            .tokens
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| MisError::Unauthorized(INVALID_TOKEN.to_string()))?;
        if !user.is_active {
            return Err(MisError::Unauthorized("User inactive or deleted.".to_string()));
        }
        Ok(user)
    }
}
