//! Redis-backed run lease.
//!
//! Time is cut into fixed slots of one scheduling period, counted from the
//! Unix epoch. Before a reminder pass starts, the scheduler takes the lease
//! for the current slot. Only one replica can hold a given slot's key, so a
//! pass is sent once per slot even with several schedulers running, and a
//! late tick of one slot never blocks the next slot.
//!
//! Uses Redis `SET NX EX` for atomic check-and-set with automatic TTL expiry.

use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// A named, slot-keyed lease.
#[derive(Debug, Clone)]
pub struct RunLease {
    job: String,
    period_secs: u64,
}

impl RunLease {
    pub fn new(job: &str, period: Duration) -> Self {
        Self {
            job: job.to_string(),
            // Redis rejects EX 0 and a zero period has no slots.
            period_secs: period.as_secs().max(1),
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    /// Index of the slot containing `at`.
    pub fn slot_at(&self, at: DateTime<Utc>) -> i64 {
        at.timestamp().div_euclid(self.period_secs as i64)
    }

    /// Slot whose start boundary lies closest to `at`.
    ///
    /// Aligned ticks fire near a boundary, a little early or late depending on
    /// clock skew; both sides resolve to the slot that boundary opens.
    pub fn slot_starting_near(&self, at: DateTime<Utc>) -> i64 {
        let half = (self.period_secs / 2) as i64;
        (at.timestamp() + half).div_euclid(self.period_secs as i64)
    }

    /// Time left until the slot after the one containing `at` begins.
    pub fn until_next_slot(&self, at: DateTime<Utc>) -> Duration {
        let period = self.period_secs as i64;
        let next_start = (self.slot_at(at) + 1) * period;
        let millis = (next_start - at.timestamp()) * 1000 - i64::from(at.timestamp_subsec_millis());
        Duration::from_millis(millis.max(0) as u64)
    }

    pub fn key(&self, slot: i64) -> String {
        format!("rally:lease:{}:{}", self.job, slot)
    }

    /// Keys outlive their slot by one period so a late retry still sees them.
    pub fn ttl_secs(&self) -> u64 {
        self.period_secs * 2
    }

    /// Try to take the lease for `slot`.
    ///
    /// Returns `true` if this caller now holds it, `false` if another holder
    /// already ran that slot.
    pub async fn try_acquire(
        &self,
        redis: &mut ConnectionManager,
        slot: i64,
    ) -> anyhow::Result<bool> {
        let key = self.key(slot);

        // SET key "1" NX EX ttl
        // Returns Some("OK") if key was set, None if it already exists
        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_secs())
            .query_async(redis)
            .await?;

        let acquired = result.is_some();

        if !acquired {
            tracing::debug!(key = %key, "Lease held elsewhere");
        }

        Ok(acquired)
    }

    /// Give the slot back so another replica may run it.
    pub async fn release(&self, redis: &mut ConnectionManager, slot: i64) -> anyhow::Result<()> {
        redis.del::<_, ()>(self.key(slot)).await?;
        Ok(())
    }
}
