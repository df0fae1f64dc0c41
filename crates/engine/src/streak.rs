//! Daily streak evaluation.
//!
//! A claim on the calendar day right after the previous claim extends the
//! streak; a claim after a longer gap (or the first ever) restarts it at 1;
//! a second claim on the same day changes nothing. Days are UTC calendar
//! days.
//!
//! The evaluation itself is pure (`evaluate`). Stores run it under a
//! per-user lock so that two claims racing on the same day cannot both
//! increment.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use rally_common::error::AppError;
use rally_common::types::{StreakState, UserId};

/// Outcome of one claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub state: StreakState,
    /// `false` when the user had already claimed today
    pub claimed: bool,
}

/// Apply a claim made at `now` to `state`.
pub fn evaluate(state: &StreakState, now: DateTime<Utc>) -> StreakUpdate {
    let today = now.date_naive();
    let last_day = state.last_claim.map(|at| at.date_naive());

    if last_day == Some(today) {
        return StreakUpdate {
            state: *state,
            claimed: false,
        };
    }

    let daily_streak = match last_day {
        Some(day) if today.pred_opt() == Some(day) => state.daily_streak.saturating_add(1),
        // Never claimed, gap of 2+ days, or a claim dated after today
        _ => 1,
    };

    StreakUpdate {
        state: StreakState {
            daily_streak,
            max_streak: state.max_streak.max(daily_streak),
            last_claim: Some(now),
        },
        claimed: true,
    }
}

#[async_trait]
pub trait StreakStore: Send + Sync {
    /// Load, evaluate and persist one claim, serialized per user.
    async fn claim(&self, user_id: UserId, now: DateTime<Utc>) -> Result<StreakUpdate, AppError>;

    /// Current state; zeroed if the user never claimed.
    async fn load(&self, user_id: UserId) -> Result<StreakState, AppError>;
}

#[derive(Debug, sqlx::FromRow)]
struct RewardRow {
    daily_streak: i32,
    max_streak: i32,
    last_claim_date: Option<DateTime<Utc>>,
}

impl RewardRow {
    fn into_state(self) -> StreakState {
        StreakState {
            daily_streak: u32::try_from(self.daily_streak).unwrap_or(0),
            max_streak: u32::try_from(self.max_streak).unwrap_or(0),
            last_claim: self.last_claim_date,
        }
    }
}

fn to_db_count(value: u32) -> Result<i32, AppError> {
    i32::try_from(value).map_err(|_| AppError::Internal(format!("Streak {} out of range", value)))
}

/// Streaks in the `rewards` table; claims take a row lock.
#[derive(Clone)]
pub struct PgStreakStore {
    pool: PgPool,
}

impl PgStreakStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StreakStore for PgStreakStore {
    async fn claim(&self, user_id: UserId, now: DateTime<Utc>) -> Result<StreakUpdate, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO rewards (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let row: RewardRow = sqlx::query_as(
            r#"
            SELECT daily_streak, max_streak, last_claim_date
            FROM rewards
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let update = evaluate(&row.into_state(), now);

        if update.claimed {
            sqlx::query(
                r#"
                UPDATE rewards
                SET daily_streak = $2, max_streak = $3, last_claim_date = $4
                WHERE user_id = $1
                "#,
            )
            .bind(user_id)
            .bind(to_db_count(update.state.daily_streak)?)
            .bind(to_db_count(update.state.max_streak)?)
            .bind(update.state.last_claim)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            user_id = %user_id,
            claimed = update.claimed,
            daily_streak = update.state.daily_streak,
            "Streak claim evaluated"
        );

        Ok(update)
    }

    async fn load(&self, user_id: UserId) -> Result<StreakState, AppError> {
        let row: Option<RewardRow> = sqlx::query_as(
            "SELECT daily_streak, max_streak, last_claim_date FROM rewards WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RewardRow::into_state).unwrap_or_default())
    }
}

/// In-memory streaks; the map lock serializes claims.
#[derive(Default)]
pub struct MemoryStreakStore {
    states: Mutex<HashMap<UserId, StreakState>>,
}

impl MemoryStreakStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user's state (e.g. a streak that started days ago).
    pub fn insert(&self, user_id: UserId, state: StreakState) {
        self.lock().insert(user_id, state);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, StreakState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl StreakStore for MemoryStreakStore {
    async fn claim(&self, user_id: UserId, now: DateTime<Utc>) -> Result<StreakUpdate, AppError> {
        let mut states = self.lock();
        let state = states.entry(user_id).or_default();
        let update = evaluate(state, now);
        *state = update.state;
        Ok(update)
    }

    async fn load(&self, user_id: UserId) -> Result<StreakState, AppError> {
        Ok(self.lock().get(&user_id).copied().unwrap_or_default())
    }
}
