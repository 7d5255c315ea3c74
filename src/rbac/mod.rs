//! Role-based access control.
//!
//! Permissions are granted to roles and roles to users. A user's effective
//! permissions are the union over every assigned role, cached per user for a
//! short TTL. Handlers authenticate through the `AuthUser` extractor (401 on
//! failure) and then call one of the `require_*` guards (403 on failure).

pub mod cache;
pub mod keys;

use std::{collections::BTreeSet, sync::Arc};

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    state::AppState,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    keys: BTreeSet<String>,
}

impl PermissionSet {
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn is_super(&self) -> bool {
        self.contains(keys::ADMIN_ACCESS)
    }

    pub fn allows(&self, key: &str) -> bool {
        self.is_super() || self.contains(key)
    }

    pub fn allows_any(&self, required: &[&str]) -> bool {
        self.is_super() || required.iter().any(|k| self.contains(k))
    }

    pub fn allows_all(&self, required: &[&str]) -> bool {
        self.is_super() || required.iter().all(|k| self.contains(k))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Union of permission keys over every role assigned to the user.
pub async fn load_user_permissions(pool: &DbPool, user_id: Uuid) -> AppResult<PermissionSet> {
    let keys: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT p.key
        FROM user_roles ur
        JOIN role_permissions rp ON rp.role_id = ur.role_id
        JOIN permissions p ON p.id = rp.permission_id
        WHERE ur.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(keys.into_iter().collect())
}

pub async fn permissions_for(state: &AppState, user_id: Uuid) -> AppResult<Arc<PermissionSet>> {
    state
        .permissions
        .get_or_load(user_id, || load_user_permissions(&state.pool, user_id))
        .await
}

pub async fn require_permission(state: &AppState, user: &AuthUser, key: &str) -> AppResult<()> {
    let perms = permissions_for(state, user.user_id).await?;
    check(perms.allows(key), user, &[key])
}

pub async fn require_any(state: &AppState, user: &AuthUser, required: &[&str]) -> AppResult<()> {
    let perms = permissions_for(state, user.user_id).await?;
    check(perms.allows_any(required), user, required)
}

pub async fn require_all(state: &AppState, user: &AuthUser, required: &[&str]) -> AppResult<()> {
    let perms = permissions_for(state, user.user_id).await?;
    check(perms.allows_all(required), user, required)
}

fn check(allowed: bool, user: &AuthUser, required: &[&str]) -> AppResult<()> {
    if allowed {
        Ok(())
    } else {
        tracing::debug!(user_id = %user.user_id, ?required, "permission denied");
        Err(AppError::Forbidden)
    }
}
