use std::time::Duration;

use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string (scheduler run lease)
    pub redis_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Port the API server binds to (default: 3000)
    pub api_port: u16,

    /// JWT secret for API authentication
    pub jwt_secret: String,

    /// JWT token expiry in hours
    pub jwt_expiry_hours: u64,

    /// Firebase project that owns the device tokens
    pub fcm_project_id: Option<String>,

    /// OAuth2 bearer token for the FCM HTTP v1 API
    pub fcm_access_token: Option<String>,

    /// FCM API base URL (default: https://fcm.googleapis.com)
    pub fcm_endpoint: String,

    /// Per-message push request timeout in seconds (default: 10)
    pub push_timeout_secs: u64,

    /// Interval between daily reminder passes in seconds (default: 86400)
    pub reminder_interval_secs: u64,

    /// How many times a failed reminder pass is retried (default: 3)
    pub reminder_max_retries: u32,

    /// Delay before retrying a failed reminder pass in seconds (default: 60)
    pub reminder_retry_backoff_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", "20")?,
            api_port: parse_var("API_PORT", "3000")?,
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            jwt_expiry_hours: parse_var("JWT_EXPIRY_HOURS", "24")?,
            fcm_project_id: std::env::var("FCM_PROJECT_ID").ok(),
            fcm_access_token: std::env::var("FCM_ACCESS_TOKEN").ok(),
            fcm_endpoint: std::env::var("FCM_ENDPOINT")
                .unwrap_or_else(|_| "https://fcm.googleapis.com".to_string()),
            push_timeout_secs: parse_var("PUSH_TIMEOUT_SECS", "10")?,
            reminder_interval_secs: parse_var("REMINDER_INTERVAL_SECS", "86400")?,
            reminder_max_retries: parse_var("REMINDER_MAX_RETRIES", "3")?,
            reminder_retry_backoff_secs: parse_var("REMINDER_RETRY_BACKOFF_SECS", "60")?,
        })
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }

    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_secs)
    }

    pub fn reminder_retry_backoff(&self) -> Duration {
        Duration::from_secs(self.reminder_retry_backoff_secs)
    }
}

/// Read a numeric variable, falling back to `default` when unset.
fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> anyhow::Result<T> {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| {
            anyhow::anyhow!(
                "{} must be a valid {}",
                name,
                std::any::type_name::<T>()
            )
        })
}
