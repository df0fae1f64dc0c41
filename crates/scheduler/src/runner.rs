//! Interval loop driving the reminder job.
//!
//! Ticks are aligned to the lease's slot boundaries, with one extra pass for
//! the current slot at startup.

use chrono::Utc;
use redis::aio::ConnectionManager;
use tokio::time::{Instant, MissedTickBehavior};

use crate::lease::RunLease;
use crate::reminder::{ReminderJob, ReminderReport};
use crate::retry::{RetryPolicy, run_with_retry};

pub struct ReminderRunner {
    job: ReminderJob,
    policy: RetryPolicy,
    lease: RunLease,
    redis: ConnectionManager,
}

impl ReminderRunner {
    pub fn new(
        job: ReminderJob,
        policy: RetryPolicy,
        lease: RunLease,
        redis: ConnectionManager,
    ) -> Self {
        Self {
            job,
            policy,
            lease,
            redis,
        }
    }

    /// Run a pass for the current slot, then one at the start of every
    /// following slot. Runs until cancelled.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        tracing::info!(
            interval_secs = self.lease.period().as_secs(),
            max_retries = self.policy.max_retries,
            backoff_secs = self.policy.backoff.as_secs(),
            "Reminder runner started"
        );

        self.tick(self.lease.slot_at(Utc::now())).await;

        let first = Instant::now() + self.lease.until_next_slot(Utc::now());
        let mut ticker = tokio::time::interval_at(first, self.lease.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.tick(self.lease.slot_starting_near(Utc::now())).await;
        }
    }

    /// One scheduled slot: take the slot's lease, then run the pass under retry.
    pub async fn tick(&mut self, slot: i64) -> Option<ReminderReport> {
        match self.lease.try_acquire(&mut self.redis, slot).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(slot, "Reminder pass for this slot already taken, skipping");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Lease unavailable, running pass without it");
            }
        }

        let job = &self.job;
        match run_with_retry(&self.policy, "daily_reminder", || job.run_once()).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    attempts = self.policy.max_retries + 1,
                    "Reminder pass dropped after retries"
                );
                if let Err(e) = self.lease.release(&mut self.redis, slot).await {
                    tracing::warn!(error = %e, "Failed to release reminder lease");
                }
                None
            }
        }
    }
}
