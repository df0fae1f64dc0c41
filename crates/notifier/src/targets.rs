//! Delivery target registry: which device tokens belong to which user.
//!
//! A token is globally unique: registering it for a new user detaches it
//! from whoever owned it before.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;

use rally_common::error::AppError;
use rally_common::types::{DeliveryTarget, UserId};

/// Result of registering a device token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Registration {
    /// `false` when the user already owned this token
    pub created: bool,
    /// Previous owner the token was taken from, if any
    pub reassigned_from: Option<UserId>,
}

#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Attach `token` to `user_id`, detaching it from any other user first.
    async fn register(&self, user_id: UserId, token: &str) -> Result<Registration, AppError>;

    /// All tokens currently registered for a user.
    async fn tokens_for(&self, user_id: UserId) -> Result<Vec<String>, AppError>;

    /// Forget a token. Returns `true` if it was registered.
    async fn remove_token(&self, token: &str) -> Result<bool, AppError>;
}

/// Reject blank tokens; returns the trimmed token.
pub fn validate_token(token: &str) -> Result<&str, AppError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::Validation("Token is required".to_string()));
    }
    Ok(token)
}

/// Passes through the lock-or-insert cycle before giving up.
const REGISTER_ATTEMPTS: u32 = 3;

/// Registry backed by the `device_tokens` table (UNIQUE on `token`).
#[derive(Clone)]
pub struct PgTargetStore {
    pool: PgPool,
}

impl PgTargetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One locked read-then-write pass.
    ///
    /// An existing row is locked with `FOR UPDATE` and moved in place, so
    /// concurrent registrations of the same token are applied one after the
    /// other. Returns `None` when another session inserted the token between
    /// our read and our insert; the caller then retries against that row.
    async fn try_register(
        &self,
        user_id: UserId,
        token: &str,
    ) -> Result<Option<Registration>, AppError> {
        let mut tx = self.pool.begin().await?;

        let owner: Option<(UserId,)> =
            sqlx::query_as("SELECT user_id FROM device_tokens WHERE token = $1 FOR UPDATE")
                .bind(token)
                .fetch_optional(&mut *tx)
                .await?;

        let registration = match owner {
            Some((owner,)) if owner == user_id => Registration {
                created: false,
                reassigned_from: None,
            },
            Some((owner,)) => {
                sqlx::query(
                    "UPDATE device_tokens SET user_id = $1, created_at = NOW() WHERE token = $2",
                )
                .bind(user_id)
                .bind(token)
                .execute(&mut *tx)
                .await?;

                Registration {
                    created: true,
                    reassigned_from: Some(owner),
                }
            }
            None => {
                let inserted = sqlx::query(
                    r#"
                    INSERT INTO device_tokens (user_id, token)
                    VALUES ($1, $2)
                    ON CONFLICT (token) DO NOTHING
                    "#,
                )
                .bind(user_id)
                .bind(token)
                .execute(&mut *tx)
                .await?;

                if inserted.rows_affected() == 0 {
                    tx.rollback().await?;
                    return Ok(None);
                }

                Registration {
                    created: true,
                    reassigned_from: None,
                }
            }
        };

        tx.commit().await?;
        Ok(Some(registration))
    }
}

#[async_trait]
impl TargetStore for PgTargetStore {
    async fn register(&self, user_id: UserId, token: &str) -> Result<Registration, AppError> {
        let token = validate_token(token)?;

        let mut attempt = 0;
        let registration = loop {
            attempt += 1;
            if let Some(registration) = self.try_register(user_id, token).await? {
                break registration;
            }
            if attempt >= REGISTER_ATTEMPTS {
                return Err(AppError::Internal(
                    "Device token registration kept conflicting".to_string(),
                ));
            }
        };

        tracing::info!(
            user_id = %user_id,
            created = registration.created,
            reassigned = registration.reassigned_from.is_some(),
            "Device token registered"
        );

        Ok(registration)
    }

    async fn tokens_for(&self, user_id: UserId) -> Result<Vec<String>, AppError> {
        let rows: Vec<DeliveryTarget> = sqlx::query_as(
            "SELECT user_id, token, created_at FROM device_tokens WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|t| t.token).collect())
    }

    async fn remove_token(&self, token: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM device_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-memory registry for tests and local runs.
#[derive(Default)]
pub struct MemoryTargetStore {
    targets: Mutex<Vec<DeliveryTarget>>,
}

impl MemoryTargetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current owner of a token.
    pub fn owner_of(&self, token: &str) -> Option<UserId> {
        self.lock()
            .iter()
            .find(|t| t.token == token)
            .map(|t| t.user_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DeliveryTarget>> {
        self.targets.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TargetStore for MemoryTargetStore {
    async fn register(&self, user_id: UserId, token: &str) -> Result<Registration, AppError> {
        let token = validate_token(token)?;
        let mut targets = self.lock();

        let existing = targets.iter().position(|t| t.token == token);
        let (created, reassigned_from) = match existing {
            Some(index) if targets[index].user_id == user_id => (false, None),
            Some(index) => {
                let previous = targets.remove(index);
                (true, Some(previous.user_id))
            }
            None => (true, None),
        };

        if created {
            targets.push(DeliveryTarget {
                user_id,
                token: token.to_string(),
                created_at: Utc::now(),
            });
        }

        Ok(Registration {
            created,
            reassigned_from,
        })
    }

    async fn tokens_for(&self, user_id: UserId) -> Result<Vec<String>, AppError> {
        Ok(self
            .lock()
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.token.clone())
            .collect())
    }

    async fn remove_token(&self, token: &str) -> Result<bool, AppError> {
        let mut targets = self.lock();
        let before = targets.len();
        targets.retain(|t| t.token != token);
        Ok(targets.len() < before)
    }
}
