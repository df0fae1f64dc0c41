//! User directory: the read-only view of application users this add-on needs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::types::UserId;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Every known user, in a stable order.
    async fn all_user_ids(&self) -> Result<Vec<UserId>, AppError>;

    /// Display name of a user, if the user exists.
    async fn username(&self, user_id: UserId) -> Result<Option<String>, AppError>;
}

/// Users backed by the host application's `users` table.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn all_user_ids(&self) -> Result<Vec<UserId>, AppError> {
        let rows: Vec<(UserId,)> = sqlx::query_as("SELECT id FROM users ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn username(&self, user_id: UserId) -> Result<Option<String>, AppError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT username FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(name,)| name))
    }
}

/// In-memory directory for tests and local runs.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: Mutex<BTreeMap<UserId, String>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: UserId, username: impl Into<String>) {
        self.lock().insert(user_id, username.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<UserId, String>> {
        // A poisoned map is still consistent: every write is a single insert.
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn all_user_ids(&self) -> Result<Vec<UserId>, AppError> {
        Ok(self.lock().keys().copied().collect())
    }

    async fn username(&self, user_id: UserId) -> Result<Option<String>, AppError> {
        Ok(self.lock().get(&user_id).cloned())
    }
}
