/// Redis connectivity for the shared backend
///
/// Only the connection layer lives here. The collection layout (hashes,
/// change channels) belongs to [`crate::store::shared`].
///
/// # Example
///
/// ```no_run
/// use taskflow_shared::redis::{RedisClient, RedisConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = RedisConfig::from_env()?;
/// let client = RedisClient::new(config).await?;
///
/// let healthy = client.ping().await?;
/// println!("Redis healthy: {}", healthy);
/// # Ok(())
/// # }
/// ```

pub mod client;

pub use client::{RedisClient, RedisClientError, RedisConfig};
