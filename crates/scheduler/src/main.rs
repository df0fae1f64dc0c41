use std::sync::Arc;

use rally_common::config::AppConfig;
use rally_common::db;
use rally_common::directory::PgUserDirectory;
use rally_common::redis_pool::connect_redis;
use rally_notifier::{FcmTransport, PgTargetStore, PushNotifier};
use rally_scheduler::lease::RunLease;
use rally_scheduler::reminder::ReminderJob;
use rally_scheduler::retry::RetryPolicy;
use rally_scheduler::runner::ReminderRunner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rally_scheduler=info,rally_notifier=info".into()),
        )
        .json()
        .init();

    tracing::info!("Rally scheduler starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to database and apply migrations
    let pool = db::connect_and_migrate(&config.database_url, config.db_max_connections).await?;

    let redis = connect_redis(&config.redis_url).await?;

    let notifier = PushNotifier::new(
        Arc::new(FcmTransport::from_config(&config)),
        Arc::new(PgTargetStore::new(pool.clone())),
    );
    let job = ReminderJob::new(Arc::new(PgUserDirectory::new(pool)), Arc::new(notifier));

    let mut runner = ReminderRunner::new(
        job,
        RetryPolicy::from_config(&config),
        RunLease::new("daily_reminder", config.reminder_interval()),
        redis,
    );

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        result = runner.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Reminder runner exited with error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("Rally scheduler stopped.");
    Ok(())
}
