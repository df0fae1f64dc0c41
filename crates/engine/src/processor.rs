//! Event processing pipeline.
//!
//! Receives inbound statistic and reward events and:
//! 1. Evaluates streaks (reward claims) via the `StreakStore`
//! 2. Unlocks achievements via the `AchievementEvaluator`
//! 3. Composes notifications for every change
//! 4. Hands them to the injected `UserNotifier`
//!
//! Delivery is decoupled from the state changes: a failed notification is
//! logged and never rolls back or re-triggers an unlock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use rally_common::error::AppError;
use rally_common::types::{
    Achievement, NotificationKind, NotificationPayload, StatSnapshot, StatUpdateEvent,
    StreakState, StreakUpdateEvent, UserId,
};
use rally_notifier::UserNotifier;

use crate::achievements::{AchievementEvaluator, AchievementStore};
use crate::composer;
use crate::streak::StreakStore;

/// Result of a daily reward claim.
#[derive(Debug, Clone, Serialize)]
pub struct RewardClaim {
    pub daily_streak: u32,
    pub max_streak: u32,
    /// `false` when the reward had already been claimed today
    pub claimed: bool,
    pub unlocked: Vec<Achievement>,
}

/// A catalog entry with the user's unlock time, if any.
#[derive(Debug, Clone, Serialize)]
pub struct AchievementStatus {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
}

/// Central processor that wires evaluators, stores and the notifier.
#[derive(Clone)]
pub struct EventProcessor {
    evaluator: AchievementEvaluator,
    achievements: Arc<dyn AchievementStore>,
    streaks: Arc<dyn StreakStore>,
    notifier: Arc<dyn UserNotifier>,
}

impl EventProcessor {
    pub fn new(
        achievements: Arc<dyn AchievementStore>,
        streaks: Arc<dyn StreakStore>,
        notifier: Arc<dyn UserNotifier>,
    ) -> Self {
        Self {
            evaluator: AchievementEvaluator::new(achievements.clone()),
            achievements,
            streaks,
            notifier,
        }
    }

    /// A user's games-won count changed.
    pub async fn handle_stat_update(
        &self,
        event: &StatUpdateEvent,
    ) -> Result<Vec<Achievement>, AppError> {
        self.unlock_and_notify(event.user_id, &StatSnapshot::games_won(event.games_won))
            .await
    }

    /// A user's daily streak changed elsewhere; check streak achievements.
    pub async fn handle_streak_update(
        &self,
        event: &StreakUpdateEvent,
    ) -> Result<Vec<Achievement>, AppError> {
        self.unlock_and_notify(
            event.user_id,
            &StatSnapshot::daily_streak(event.daily_streak),
        )
        .await
    }

    /// Claim today's reward: update the streak, notify, check streak achievements.
    pub async fn claim_daily_reward(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<RewardClaim, AppError> {
        let update = self.streaks.claim(user_id, now).await?;

        if update.claimed {
            tracing::info!(
                user_id = %user_id,
                daily_streak = update.state.daily_streak,
                max_streak = update.state.max_streak,
                "Daily streak updated"
            );
            self.notify(
                user_id,
                NotificationKind::StreakUpdate,
                &composer::for_streak(&update.state),
            )
            .await;
        }

        let unlocked = self
            .unlock_and_notify(
                user_id,
                &StatSnapshot::daily_streak(update.state.daily_streak),
            )
            .await?;

        Ok(RewardClaim {
            daily_streak: update.state.daily_streak,
            max_streak: update.state.max_streak,
            claimed: update.claimed,
            unlocked,
        })
    }

    /// Current streak without claiming.
    pub async fn streak(&self, user_id: UserId) -> Result<StreakState, AppError> {
        self.streaks.load(user_id).await
    }

    /// Push a chat message notification to `receiver_id`.
    ///
    /// Returns the number of devices reached.
    pub async fn send_chat(
        &self,
        sender_id: UserId,
        sender_name: &str,
        receiver_id: UserId,
        message: &str,
    ) -> Result<usize, AppError> {
        if message.trim().is_empty() {
            return Err(AppError::Validation("Message is required".to_string()));
        }

        let payload = composer::for_chat(sender_id, sender_name, message);
        Ok(self
            .notify(receiver_id, NotificationKind::ChatMessage, &payload)
            .await)
    }

    /// The catalog annotated with one user's unlocks.
    pub async fn achievements_for(
        &self,
        user_id: UserId,
    ) -> Result<Vec<AchievementStatus>, AppError> {
        let catalog = self.achievements.catalog().await?;
        let records = self.achievements.unlocked_for(user_id).await?;

        Ok(catalog
            .into_iter()
            .map(|achievement| {
                let unlocked_at = records
                    .iter()
                    .find(|r| r.achievement_id == achievement.id)
                    .map(|r| r.unlocked_at);
                AchievementStatus {
                    achievement,
                    unlocked: unlocked_at.is_some(),
                    unlocked_at,
                }
            })
            .collect())
    }

    async fn unlock_and_notify(
        &self,
        user_id: UserId,
        snapshot: &StatSnapshot,
    ) -> Result<Vec<Achievement>, AppError> {
        let catalog = self.achievements.catalog().await?;
        let unlocked = self.evaluator.evaluate(user_id, snapshot, &catalog).await;

        for achievement in &unlocked {
            self.notify(
                user_id,
                NotificationKind::AchievementUnlocked,
                &composer::for_achievement(achievement),
            )
            .await;
        }

        Ok(unlocked)
    }

    /// Deliver and swallow failures into a structured log record.
    async fn notify(
        &self,
        user_id: UserId,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> usize {
        match self.notifier.send_to_user(user_id, payload).await {
            Ok(delivered) => {
                tracing::debug!(user_id = %user_id, kind = %kind, delivered, "Notification sent");
                delivered
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    kind = %kind,
                    title = %payload.title,
                    error = %e,
                    "Notification delivery failed"
                );
                0
            }
        }
    }
}
