//! Shared application state for the Axum API server.

use std::sync::Arc;

use sqlx::PgPool;

use rally_common::config::AppConfig;
use rally_common::directory::{PgUserDirectory, UserDirectory};
use rally_engine::achievements::PgAchievementStore;
use rally_engine::processor::EventProcessor;
use rally_engine::streak::PgStreakStore;
use rally_notifier::{FcmTransport, PgTargetStore, PushNotifier, TargetStore};

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub processor: EventProcessor,
    pub targets: Arc<dyn TargetStore>,
    pub users: Arc<dyn UserDirectory>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        processor: EventProcessor,
        targets: Arc<dyn TargetStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            config,
            processor,
            targets,
            users,
        }
    }

    /// Wire the Postgres stores and the FCM transport.
    pub fn from_pool(pool: PgPool, config: AppConfig) -> Self {
        let targets: Arc<dyn TargetStore> = Arc::new(PgTargetStore::new(pool.clone()));
        let notifier = PushNotifier::new(
            Arc::new(FcmTransport::from_config(&config)),
            targets.clone(),
        );
        let processor = EventProcessor::new(
            Arc::new(PgAchievementStore::new(pool.clone())),
            Arc::new(PgStreakStore::new(pool.clone())),
            Arc::new(notifier),
        );

        Self::new(
            config,
            processor,
            targets,
            Arc::new(PgUserDirectory::new(pool)),
        )
    }
}
