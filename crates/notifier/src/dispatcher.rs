//! Fan-out of one notification to every device token of a user.
//!
//! Each token is attempted independently and concurrently; one failing
//! token never blocks the others. Tokens the provider reports as
//! unregistered are removed from the registry. Nothing is retried here.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use rally_common::error::AppError;
use rally_common::types::{NotificationPayload, UserId};

use crate::targets::TargetStore;
use crate::transport::PushTransport;

/// Capability to notify a user on all of their devices.
///
/// Handed to the event processor at construction time.
#[async_trait]
pub trait UserNotifier: Send + Sync {
    /// Returns the number of devices the notification reached.
    async fn send_to_user(
        &self,
        user_id: UserId,
        payload: &NotificationPayload,
    ) -> Result<usize, AppError>;
}

/// Push notifier over a transport and a target registry.
#[derive(Clone)]
pub struct PushNotifier {
    transport: Arc<dyn PushTransport>,
    targets: Arc<dyn TargetStore>,
}

impl PushNotifier {
    pub fn new(transport: Arc<dyn PushTransport>, targets: Arc<dyn TargetStore>) -> Self {
        Self { transport, targets }
    }

    /// Deliver to each token independently; returns the success count.
    pub async fn send_to_tokens(&self, tokens: &[String], payload: &NotificationPayload) -> usize {
        let unique: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();
        let attempts = unique.iter().map(|token| self.deliver(token, payload));
        let delivered = join_all(attempts).await.into_iter().filter(|ok| *ok).count();

        tracing::info!(
            delivered,
            failed = unique.len() - delivered,
            title = %payload.title,
            "Push fan-out finished"
        );

        delivered
    }

    async fn deliver(&self, token: &str, payload: &NotificationPayload) -> bool {
        match self.transport.send(token, payload).await {
            Ok(message_id) => {
                tracing::debug!(token = token_prefix(token), %message_id, "Push delivered");
                true
            }
            Err(e) if e.is_unregistered() => {
                match self.targets.remove_token(token).await {
                    Ok(_) => tracing::info!(
                        token = token_prefix(token),
                        "Removed unregistered device token"
                    ),
                    Err(e) => tracing::warn!(
                        token = token_prefix(token),
                        error = %e,
                        "Failed to remove unregistered device token"
                    ),
                }
                false
            }
            Err(e) => {
                tracing::warn!(
                    token = token_prefix(token),
                    error = %e,
                    "Push delivery failed"
                );
                false
            }
        }
    }
}

#[async_trait]
impl UserNotifier for PushNotifier {
    async fn send_to_user(
        &self,
        user_id: UserId,
        payload: &NotificationPayload,
    ) -> Result<usize, AppError> {
        let tokens = self.targets.tokens_for(user_id).await?;
        if tokens.is_empty() {
            tracing::debug!(user_id = %user_id, "No device tokens registered");
            return Ok(0);
        }

        Ok(self.send_to_tokens(&tokens, payload).await)
    }
}

/// Enough of a token to correlate log lines without leaking it.
fn token_prefix(token: &str) -> &str {
    token.get(..15).unwrap_or(token)
}
