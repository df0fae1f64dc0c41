use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of an application user.
pub type UserId = Uuid;

/// The user statistic an unlock condition compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum StatKind {
    GamesWon,
    DailyStreak,
}

impl std::fmt::Display for StatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatKind::GamesWon => write!(f, "games_won"),
            StatKind::DailyStreak => write!(f, "daily_streak"),
        }
    }
}

/// A named threshold rule: unlocked once `stat >= threshold`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockCondition {
    /// Stable tag, e.g. `first_win` or `3_day_streak`
    pub tag: String,
    pub stat: StatKind,
    pub threshold: u32,
}

impl UnlockCondition {
    pub fn new(tag: impl Into<String>, stat: StatKind, threshold: u32) -> Self {
        Self {
            tag: tag.into(),
            stat,
            threshold,
        }
    }

    /// Whether the snapshot satisfies this condition.
    ///
    /// A snapshot that does not carry the compared statistic never satisfies it.
    pub fn is_met(&self, snapshot: &StatSnapshot) -> bool {
        snapshot
            .get(self.stat)
            .is_some_and(|value| value >= self.threshold)
    }
}

/// An achievement from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: Uuid,
    pub title: String,
    pub condition: UnlockCondition,
}

/// Proof that a user unlocked an achievement. At most one per pair.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UnlockRecord {
    pub user_id: UserId,
    pub achievement_id: Uuid,
    pub unlocked: bool,
    pub unlocked_at: DateTime<Utc>,
}

/// Per-user daily streak bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    /// Consecutive calendar days with a claim
    pub daily_streak: u32,
    /// Longest streak ever reached; never below `daily_streak`
    pub max_streak: u32,
    /// Full timestamp of the most recent claim
    pub last_claim: Option<DateTime<Utc>>,
}

/// A device token registered for push delivery.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeliveryTarget {
    pub user_id: UserId,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

/// Read-only view of the statistics carried by an inbound event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatSnapshot {
    pub games_won: Option<u32>,
    pub daily_streak: Option<u32>,
}

impl StatSnapshot {
    pub fn games_won(games_won: u32) -> Self {
        Self {
            games_won: Some(games_won),
            daily_streak: None,
        }
    }

    pub fn daily_streak(daily_streak: u32) -> Self {
        Self {
            games_won: None,
            daily_streak: Some(daily_streak),
        }
    }

    pub fn get(&self, stat: StatKind) -> Option<u32> {
        match stat {
            StatKind::GamesWon => self.games_won,
            StatKind::DailyStreak => self.daily_streak,
        }
    }
}

/// Inbound: a user's games-won count changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatUpdateEvent {
    pub user_id: UserId,
    pub games_won: u32,
}

/// Inbound: a user's daily streak changed (already evaluated).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakUpdateEvent {
    pub user_id: UserId,
    pub daily_streak: u32,
}

/// Kinds of push notification the composer knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    AchievementUnlocked,
    StreakUpdate,
    DailyReminder,
    ChatMessage,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::AchievementUnlocked => write!(f, "achievement_unlocked"),
            NotificationKind::StreakUpdate => write!(f, "streak_update"),
            NotificationKind::DailyReminder => write!(f, "daily_reminder"),
            NotificationKind::ChatMessage => write!(f, "chat_message"),
        }
    }
}

/// Human-readable notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Short title (e.g., "🔥 Daily Streak!")
    pub title: String,
    /// Body text shown under the title
    pub body: String,
    /// Key/value data delivered alongside; push providers require string values
    pub data: BTreeMap<String, String>,
}
