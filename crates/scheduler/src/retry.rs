//! Bounded whole-task retry with a fixed backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rally_common::config::AppConfig;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.reminder_max_retries, config.reminder_retry_backoff())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BACKOFF)
    }
}

/// Run `op` until it succeeds or the policy's retries are spent.
///
/// The last error is returned once every attempt has failed.
pub async fn run_with_retry<T, E, F, Fut>(policy: &RetryPolicy, task: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_retries => {
                attempt += 1;
                tracing::warn!(
                    task,
                    attempt,
                    max_retries = policy.max_retries,
                    backoff_secs = policy.backoff.as_secs(),
                    error = %e,
                    "Task failed, retrying after backoff"
                );
                tokio::time::sleep(policy.backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}
