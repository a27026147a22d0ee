//! Redis client implementation
//!
//! This module provides a Redis client with connection retry, operation retry
//! with exponential backoff, and the handful of commands the counter store
//! needs: hash reads, Lua script invocation and the server clock.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::{aio::MultiplexedConnection, Client, FromRedisValue, RedisError, RedisResult, Script};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use tm_shared::config::CacheConfig;

use crate::InfrastructureError;

type RedisFuture<T> = Pin<Box<dyn Future<Output = RedisResult<T>> + Send>>;

/// Redis client with connection and operation retry
///
/// Cloning is cheap; clones share the multiplexed connection.
#[derive(Clone)]
pub struct RedisClient {
    /// Redis multiplexed connection for async operations
    connection: MultiplexedConnection,
    /// Maximum number of attempts per operation
    max_retries: u32,
    /// Base delay between retries (exponential backoff)
    retry_delay_ms: u64,
}

impl RedisClient {
    /// Connect using the retry settings of `config`
    ///
    /// # Returns
    /// * `Ok(RedisClient)` - Connected client
    /// * `Err(InfrastructureError::Config)` - If the URL cannot be parsed
    /// * `Err(InfrastructureError::Cache)` - If every connection attempt failed
    pub async fn new(config: &CacheConfig) -> Result<Self, InfrastructureError> {
        info!(url = %mask_url(&config.url), "Creating Redis client");

        let client = Client::open(config.url.as_str()).map_err(|e| {
            error!("Failed to parse Redis URL: {}", e);
            InfrastructureError::Config(format!("Invalid Redis URL: {}", e))
        })?;

        let max_retries = config.max_retries.max(1);
        let connection = Self::create_connection_with_retry(client, max_retries, config.retry_delay_ms).await?;

        info!("Redis client created successfully");

        Ok(Self {
            connection,
            max_retries,
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    async fn create_connection_with_retry(
        client: Client,
        max_retries: u32,
        retry_delay_ms: u64,
    ) -> Result<MultiplexedConnection, InfrastructureError> {
        let mut attempts = 0;
        let mut delay = retry_delay_ms;

        loop {
            attempts += 1;
            debug!("Attempting to connect to Redis (attempt {})", attempts);

            match client.get_multiplexed_async_connection().await {
                Ok(connection) => return Ok(connection),
                Err(e) if attempts < max_retries => {
                    warn!(
                        "Failed to connect to Redis (attempt {}/{}): {}. Retrying in {}ms...",
                        attempts, max_retries, e, delay
                    );
                    sleep(Duration::from_millis(delay)).await;
                    delay = next_delay(delay);
                }
                Err(e) => {
                    error!("Failed to connect to Redis after {} attempts: {}", attempts, e);
                    return Err(InfrastructureError::Cache(e));
                }
            }
        }
    }

    /// Read several fields of a hash (`HMGET`); missing fields come back as `None`
    pub async fn hash_fields(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>, InfrastructureError> {
        debug!(key = %key, "Reading hash fields");

        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        self.execute_with_retry(|mut conn| {
            let key = key.to_string();
            let fields = fields.clone();

            Box::pin(async move {
                redis::cmd("HMGET")
                    .arg(key)
                    .arg(fields)
                    .query_async::<_, Vec<Option<String>>>(&mut conn)
                    .await
            })
        })
        .await
        .map_err(|e| {
            error!(key = %key, error = %e, "Failed to read hash");
            InfrastructureError::Cache(e)
        })
    }

    /// Run a Lua script with the given keys and arguments
    ///
    /// The script runs atomically on the server. Uses `EVALSHA` and falls back
    /// to loading the script when the server does not know it yet.
    pub async fn run_script<T>(&self, script: &Script, keys: &[String], args: &[String]) -> Result<T, InfrastructureError>
    where
        T: FromRedisValue + Send + 'static,
    {
        self.execute_with_retry(|mut conn| {
            let script = script.clone();
            let keys = keys.to_vec();
            let args = args.to_vec();

            Box::pin(async move {
                let mut invocation = script.prepare_invoke();
                for key in &keys {
                    invocation.key(key);
                }
                for arg in &args {
                    invocation.arg(arg);
                }
                let value: T = invocation.invoke_async(&mut conn).await?;
                Ok(value)
            })
        })
        .await
        .map_err(|e| {
            error!(keys = ?keys, error = %e, "Redis script failed");
            InfrastructureError::Cache(e)
        })
    }

    /// Current time according to the Redis server (`TIME`)
    pub async fn server_time(&self) -> Result<DateTime<Utc>, InfrastructureError> {
        let (seconds, micros) = self
            .execute_with_retry(|mut conn| {
                Box::pin(async move { redis::cmd("TIME").query_async::<_, (i64, u32)>(&mut conn).await })
            })
            .await?;

        DateTime::from_timestamp(seconds, micros.saturating_mul(1_000))
            .ok_or_else(|| InfrastructureError::General(format!("Redis TIME out of range: {}.{}", seconds, micros)))
    }

    /// Check if the Redis connection is healthy
    ///
    /// Performs a PING command to verify connectivity.
    pub async fn health_check(&self) -> Result<bool, InfrastructureError> {
        debug!("Performing Redis health check");

        let result = self
            .execute_with_retry(|mut conn| {
                Box::pin(async move { redis::cmd("PING").query_async::<_, String>(&mut conn).await })
            })
            .await;

        match result {
            Ok(response) if response == "PONG" => Ok(true),
            Ok(response) => {
                warn!("Redis health check returned unexpected response: {}", response);
                Ok(false)
            }
            Err(e) => {
                error!("Redis health check failed: {}", e);
                Err(InfrastructureError::Cache(e))
            }
        }
    }

    /// Execute a Redis operation, retrying transient failures with exponential backoff
    async fn execute_with_retry<F, T>(&self, operation: F) -> RedisResult<T>
    where
        F: Fn(MultiplexedConnection) -> RedisFuture<T>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay_ms;

        loop {
            attempts += 1;
            let conn = self.connection.clone();

            match operation(conn).await {
                Ok(result) => return Ok(result),
                Err(e) if attempts < self.max_retries && is_retriable_error(&e) => {
                    warn!(
                        "Redis operation failed (attempt {}/{}): {}. Retrying in {}ms...",
                        attempts, self.max_retries, e, delay
                    );
                    sleep(Duration::from_millis(delay)).await;
                    delay = next_delay(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Double the delay, capped at 5 seconds
pub(crate) fn next_delay(delay_ms: u64) -> u64 {
    delay_ms.saturating_mul(2).min(5000)
}

/// Whether a Redis error is transient and the operation should be retried
pub(crate) fn is_retriable_error(error: &RedisError) -> bool {
    matches!(
        error.kind(),
        redis::ErrorKind::IoError
            | redis::ErrorKind::BusyLoadingError
            | redis::ErrorKind::TryAgain
    )
}

/// Mask credentials in a Redis URL for logging
pub(crate) fn mask_url(url: &str) -> String {
    if let (Some(at_pos), Some(proto_end)) = (url.rfind('@'), url.find("://")) {
        if at_pos > proto_end {
            return format!("{}****{}", &url[..proto_end + 3], &url[at_pos..]);
        }
    }
    url.to_string()
}
