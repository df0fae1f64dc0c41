//! Achievement rule evaluator.
//!
//! The catalog is data: every achievement carries an `UnlockCondition`
//! (statistic + threshold) and one loop evaluates them all. A qualifying
//! achievement is unlocked through a single conditional insert keyed by
//! `(user_id, achievement_id)`, so two concurrent evaluations of the same
//! threshold crossing can never both report it as new.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use rally_common::error::AppError;
use rally_common::types::{
    Achievement, StatKind, StatSnapshot, UnlockCondition, UnlockRecord, UserId,
};

#[async_trait]
pub trait AchievementStore: Send + Sync {
    /// The full achievement catalog.
    async fn catalog(&self) -> Result<Vec<Achievement>, AppError>;

    /// Atomically create the unlock record for `(user_id, achievement_id)`.
    ///
    /// Returns `true` only for the call that created it.
    async fn try_unlock(
        &self,
        user_id: UserId,
        achievement_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Unlock records of one user.
    async fn unlocked_for(&self, user_id: UserId) -> Result<Vec<UnlockRecord>, AppError>;
}

#[derive(Debug, sqlx::FromRow)]
struct AchievementRow {
    id: Uuid,
    title: String,
    unlock_condition: String,
    stat: StatKind,
    threshold: i32,
}

impl TryFrom<AchievementRow> for Achievement {
    type Error = AppError;

    fn try_from(row: AchievementRow) -> Result<Self, Self::Error> {
        let threshold = u32::try_from(row.threshold).map_err(|_| {
            AppError::Internal(format!(
                "Achievement '{}' has a negative threshold",
                row.unlock_condition
            ))
        })?;

        Ok(Achievement {
            id: row.id,
            title: row.title,
            condition: UnlockCondition::new(row.unlock_condition, row.stat, threshold),
        })
    }
}

/// Achievements and unlock records in Postgres.
///
/// `user_achievements` has its primary key on `(user_id, achievement_id)`;
/// `ON CONFLICT DO NOTHING` turns the insert into get-or-create.
#[derive(Clone)]
pub struct PgAchievementStore {
    pool: PgPool,
}

impl PgAchievementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AchievementStore for PgAchievementStore {
    async fn catalog(&self) -> Result<Vec<Achievement>, AppError> {
        let rows: Vec<AchievementRow> = sqlx::query_as(
            "SELECT id, title, unlock_condition, stat, threshold FROM achievements ORDER BY stat, threshold",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Achievement::try_from).collect()
    }

    async fn try_unlock(
        &self,
        user_id: UserId,
        achievement_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_achievements (user_id, achievement_id, unlocked, unlocked_at)
            VALUES ($1, $2, true, $3)
            ON CONFLICT (user_id, achievement_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(achievement_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn unlocked_for(&self, user_id: UserId) -> Result<Vec<UnlockRecord>, AppError> {
        let records: Vec<UnlockRecord> = sqlx::query_as(
            r#"
            SELECT user_id, achievement_id, unlocked, unlocked_at
            FROM user_achievements
            WHERE user_id = $1 AND unlocked = true
            ORDER BY unlocked_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

/// In-memory store: compare-and-set over a map keyed by `(user, achievement)`.
pub struct MemoryAchievementStore {
    catalog: Vec<Achievement>,
    unlocks: Mutex<HashMap<(UserId, Uuid), UnlockRecord>>,
}

impl MemoryAchievementStore {
    pub fn new(catalog: Vec<Achievement>) -> Self {
        Self {
            catalog,
            unlocks: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(UserId, Uuid), UnlockRecord>> {
        self.unlocks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AchievementStore for MemoryAchievementStore {
    async fn catalog(&self) -> Result<Vec<Achievement>, AppError> {
        Ok(self.catalog.clone())
    }

    async fn try_unlock(
        &self,
        user_id: UserId,
        achievement_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        match self.lock().entry((user_id, achievement_id)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(UnlockRecord {
                    user_id,
                    achievement_id,
                    unlocked: true,
                    unlocked_at: at,
                });
                Ok(true)
            }
        }
    }

    async fn unlocked_for(&self, user_id: UserId) -> Result<Vec<UnlockRecord>, AppError> {
        let mut records: Vec<UnlockRecord> = self
            .lock()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.unlocked_at);
        Ok(records)
    }
}

/// Maps a statistic snapshot to newly unlocked achievements.
#[derive(Clone)]
pub struct AchievementEvaluator {
    store: Arc<dyn AchievementStore>,
}

impl AchievementEvaluator {
    pub fn new(store: Arc<dyn AchievementStore>) -> Self {
        Self { store }
    }

    /// Unlock every catalog entry the snapshot satisfies and report the new ones.
    ///
    /// Each achievement is unlocked on its own; a store failure for one is
    /// logged and does not stop the others.
    pub async fn evaluate(
        &self,
        user_id: UserId,
        snapshot: &StatSnapshot,
        catalog: &[Achievement],
    ) -> Vec<Achievement> {
        let now = Utc::now();
        let mut newly_unlocked = Vec::new();

        for achievement in catalog.iter().filter(|a| a.condition.is_met(snapshot)) {
            match self.store.try_unlock(user_id, achievement.id, now).await {
                Ok(true) => {
                    tracing::info!(
                        user_id = %user_id,
                        achievement = %achievement.condition.tag,
                        "Achievement unlocked"
                    );
                    newly_unlocked.push(achievement.clone());
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        user_id = %user_id,
                        achievement = %achievement.condition.tag,
                        error = %e,
                        "Failed to record achievement unlock"
                    );
                }
            }
        }

        newly_unlocked
    }
}
