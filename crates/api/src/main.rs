//! Rally API server binary entrypoint.

use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use rally_common::config::AppConfig;
use rally_common::db::connect_and_migrate;

use rally_api::routes::create_router;
use rally_api::state::AppState;

/// Inbound bodies are small JSON documents.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("rally_api=debug,rally_engine=debug,rally_notifier=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting Rally API server...");

    let config = AppConfig::from_env()?;

    let pool = connect_and_migrate(&config.database_url, config.db_max_connections).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    let state = AppState::from_pool(pool, config);

    let app = create_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Received shutdown signal, stopping gracefully...");
        })
        .await?;

    Ok(())
}
