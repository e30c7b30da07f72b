/// Redis client wrapper used by the shared store
///
/// Holds two things:
/// - a `redis::aio::ConnectionManager` for commands (reconnects on its own)
/// - the underlying `redis::Client`, used to open one dedicated pub/sub
///   connection per subscription
///
/// # Example
///
/// ```no_run
/// use taskflow_shared::redis::client::{RedisClient, RedisConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = RedisConfig::from_env()?;
/// let client = RedisClient::new(config).await?;
///
/// let mut pubsub = client.pubsub().await?;
/// pubsub.subscribe("taskflow:changes:tasks").await?;
/// # Ok(())
/// # }
/// ```

use redis::aio::{ConnectionManager, PubSub};
use redis::{Client, RedisError};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Redis client errors
#[derive(Error, Debug)]
pub enum RedisClientError {
    /// Connection error
    #[error("Redis connection error: {0}")]
    ConnectionError(String),

    /// Command execution error
    #[error("Redis command error: {0}")]
    CommandError(String),

    /// Configuration error
    #[error("Redis configuration error: {0}")]
    ConfigError(String),

    /// Health check failed
    #[error("Redis health check failed: {0}")]
    HealthCheckFailed(String),
}

impl From<RedisError> for RedisClientError {
    fn from(err: RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::IoError => {
                RedisClientError::ConnectionError(format!("IO error: {}", err))
            }
            _ => RedisClientError::CommandError(err.to_string()),
        }
    }
}

/// Redis connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    ///
    /// Format: redis://[username:password@]host:port[/db]
    pub url: String,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Command timeout in seconds (health checks only; writes are not timed out)
    pub command_timeout_secs: u64,
}

impl RedisConfig {
    /// Builds a configuration for an explicit URL with default timeouts
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection_timeout_secs: 5,
            command_timeout_secs: 10,
        }
    }

    /// Loads the configuration from environment variables
    ///
    /// # Environment Variables
    ///
    /// - `REDIS_URL`: Redis connection URL (required)
    /// - `REDIS_CONNECTION_TIMEOUT_SECS`: Connection timeout (default: 5)
    /// - `REDIS_COMMAND_TIMEOUT_SECS`: Command timeout (default: 10)
    ///
    /// # Errors
    ///
    /// Returns an error if REDIS_URL is not set.
    pub fn from_env() -> Result<Self, RedisClientError> {
        dotenvy::dotenv().ok();

        let url = env::var("REDIS_URL").map_err(|_| {
            RedisClientError::ConfigError("REDIS_URL environment variable is required".to_string())
        })?;

        let mut config = Self::with_url(url);

        if let Some(secs) = env::var("REDIS_CONNECTION_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.connection_timeout_secs = secs;
        }

        if let Some(secs) = env::var("REDIS_COMMAND_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.command_timeout_secs = secs;
        }

        Ok(config)
    }
}

/// Redis client with a managed command connection
///
/// Cheap to clone; clones share the same connection manager.
#[derive(Clone)]
pub struct RedisClient {
    client: Client,
    manager: ConnectionManager,
    config: Arc<RedisConfig>,
}

impl RedisClient {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, or the connection cannot be
    /// established within `connection_timeout_secs`.
    pub async fn new(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str()).map_err(|e| {
            RedisClientError::ConfigError(format!("Invalid Redis URL: {}", e))
        })?;

        let manager = tokio::time::timeout(
            Duration::from_secs(config.connection_timeout_secs),
            ConnectionManager::new(client.clone()),
        )
        .await
        .map_err(|_| RedisClientError::ConnectionError("connection timed out".to_string()))?
        .map_err(|e| {
            RedisClientError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        tracing::info!(url = %sanitize_url(&config.url), "Redis client connected");

        Ok(Self {
            client,
            manager,
            config: Arc::new(config),
        })
    }

    /// Sends PING and reports whether PONG came back
    pub async fn ping(&self) -> Result<bool, RedisClientError> {
        let mut conn = self.manager.clone();

        let result: Result<String, RedisError> = tokio::time::timeout(
            Duration::from_secs(self.config.command_timeout_secs),
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| {
            RedisClientError::HealthCheckFailed("PING command timed out".to_string())
        })?;

        match result {
            Ok(pong) if pong == "PONG" => {
                tracing::debug!("Redis health check: PONG received");
                Ok(true)
            }
            Ok(other) => {
                tracing::warn!(response = %other, "Redis health check: unexpected response");
                Ok(false)
            }
            Err(e) => {
                tracing::error!(error = %e, "Redis health check failed");
                Err(RedisClientError::HealthCheckFailed(e.to_string()))
            }
        }
    }

    /// Command connection handle
    pub fn get_connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Opens a dedicated pub/sub connection
    ///
    /// A pub/sub connection cannot issue regular commands, so every
    /// subscription gets its own.
    pub async fn pubsub(&self) -> Result<PubSub, RedisError> {
        let conn = self.client.get_async_connection().await?;
        Ok(conn.into_pubsub())
    }

    /// Connection URL with credentials masked, for logs
    pub fn url(&self) -> String {
        sanitize_url(&self.config.url)
    }

    /// Gets the Redis configuration
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}

/// Connection URL with any username and password masked
///
/// Unparseable input is returned unchanged so it can still be logged.
fn sanitize_url(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    if parsed.username().is_empty() && parsed.password().is_none() {
        return url.to_string();
    }
    let _ = parsed.set_username("***");
    let _ = parsed.set_password(Some("***"));
    parsed.to_string()
}
