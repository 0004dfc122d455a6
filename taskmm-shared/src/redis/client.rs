/// Redis client wrapper shared by the token blocklist and the rate limiter
///
/// Wraps `redis::aio::ConnectionManager`, which multiplexes commands over one
/// connection and reconnects on failure. Every command is bounded by the
/// configured command timeout so a stalled Redis surfaces as an error instead
/// of a hung request.
///
/// # Example
///
/// ```no_run
/// use taskmm_shared::redis::client::{RedisClient, RedisConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RedisConfig {
///     url: "redis://localhost:6379".to_string(),
///     connection_timeout_secs: 5,
///     command_timeout_secs: 2,
/// };
/// let client = RedisClient::new(config).await?;
///
/// let healthy = client.ping().await?;
/// println!("Redis healthy: {}", healthy);
/// # Ok(())
/// # }
/// ```

use redis::aio::ConnectionManager;
use redis::{Client, FromRedisValue, Pipeline, RedisError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Redis client errors
#[derive(Error, Debug)]
pub enum RedisClientError {
    /// Connection error
    #[error("Redis connection error: {0}")]
    ConnectionError(String),

    /// Command execution error
    #[error("Redis command error: {0}")]
    CommandError(String),

    /// Command did not complete within the configured timeout
    #[error("Redis command timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration error
    #[error("Redis configuration error: {0}")]
    ConfigError(String),
}

impl From<RedisError> for RedisClientError {
    fn from(err: RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::IoError => {
                RedisClientError::ConnectionError(format!("IO error: {}", err))
            }
            redis::ErrorKind::ResponseError => {
                RedisClientError::CommandError(format!("Response error: {}", err))
            }
            _ => RedisClientError::CommandError(err.to_string()),
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    ///
    /// Format: redis://[username:password@]host:port[/db]
    pub url: String,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Command timeout in seconds
    pub command_timeout_secs: u64,
}

impl RedisConfig {
    /// Configuration pointing at a local Redis, for tests
    pub fn local() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connection_timeout_secs: 5,
            command_timeout_secs: 2,
        }
    }
}

/// Cloneable Redis handle
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    config: Arc<RedisConfig>,
}

impl RedisClient {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the first connection cannot
    /// be established within the connection timeout.
    pub async fn new(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str()).map_err(|e| {
            RedisClientError::ConfigError(format!("Invalid Redis URL: {}", e))
        })?;

        let timeout = Duration::from_secs(config.connection_timeout_secs);
        let manager = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| RedisClientError::Timeout(timeout))?
            .map_err(|e| {
                RedisClientError::ConnectionError(format!("Failed to connect to Redis: {}", e))
            })?;

        tracing::info!(url = %sanitize_url(&config.url), "Redis client connected");

        Ok(Self {
            manager,
            config: Arc::new(config),
        })
    }

    /// Sends PING and reports whether PONG came back
    pub async fn ping(&self) -> Result<bool, RedisClientError> {
        let pong: String = self.query(redis::cmd("PING")).await?;
        Ok(pong == "PONG")
    }

    /// Runs a single command under the command timeout
    pub async fn query<T: FromRedisValue>(&self, cmd: redis::Cmd) -> Result<T, RedisClientError> {
        let mut conn = self.manager.clone();
        let timeout = self.command_timeout();

        tokio::time::timeout(timeout, cmd.query_async(&mut conn))
            .await
            .map_err(|_| RedisClientError::Timeout(timeout))?
            .map_err(RedisClientError::from)
    }

    /// Runs a pipeline under the command timeout
    pub async fn query_pipeline<T: FromRedisValue>(
        &self,
        pipeline: &Pipeline,
    ) -> Result<T, RedisClientError> {
        let mut conn = self.manager.clone();
        let timeout = self.command_timeout();

        tokio::time::timeout(timeout, pipeline.query_async(&mut conn))
            .await
            .map_err(|_| RedisClientError::Timeout(timeout))?
            .map_err(RedisClientError::from)
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.config.command_timeout_secs)
    }
}

/// Replaces credentials in a Redis URL with `***:***` for logging
fn sanitize_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end + 3];
            let host = &url[at_pos + 1..];
            return format!("{}***:***@{}", scheme, host);
        }
    }
    url.to_string()
}
