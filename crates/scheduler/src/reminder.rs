//! Daily reminder pass.

use std::sync::Arc;

use rally_common::directory::UserDirectory;
use rally_common::error::AppError;
use rally_engine::composer;
use rally_notifier::UserNotifier;

/// Outcome of one completed pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReminderReport {
    pub users: usize,
    pub delivered: usize,
}

/// Sends the daily reminder to every known user.
pub struct ReminderJob {
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn UserNotifier>,
}

impl ReminderJob {
    pub fn new(users: Arc<dyn UserDirectory>, notifier: Arc<dyn UserNotifier>) -> Self {
        Self { users, notifier }
    }

    /// Run one pass. The first error aborts the pass; re-sending to users
    /// already reached is harmless, so callers retry the whole pass.
    pub async fn run_once(&self) -> Result<ReminderReport, AppError> {
        let user_ids = self.users.all_user_ids().await?;
        let payload = composer::daily_reminder();

        let mut report = ReminderReport {
            users: user_ids.len(),
            delivered: 0,
        };

        for user_id in user_ids {
            report.delivered += self.notifier.send_to_user(user_id, &payload).await?;
        }

        tracing::info!(
            users = report.users,
            delivered = report.delivered,
            "Daily reminder pass complete"
        );

        Ok(report)
    }
}
