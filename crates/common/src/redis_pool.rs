use redis::Client;
use redis::aio::ConnectionManager;

/// Open a Redis connection manager; it reconnects on its own after drops.
pub async fn connect_redis(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)
        .map_err(|e| anyhow::anyhow!("Invalid REDIS_URL '{}': {}", redis_url, e))?;
    let manager = ConnectionManager::new(client).await?;

    tracing::info!("Connected to Redis");
    Ok(manager)
}
