//! Redis cache client
//!
//! [`RedisCache`] implements [`CacheBackend`] over a single multiplexed
//! connection shared by all requests (each request works on a cheap clone of
//! the handle). The connection is opened lazily:
//!
//! - a failed initial PING is logged and the server starts anyway
//! - one connect attempt runs at a time, bounded by `connection_timeout`;
//!   callers queued behind a failed attempt fail at once instead of dialing
//! - after a failed connect, calls fail fast for `reconnect_backoff`
//! - a failed command drops the handle so the next call reconnects
//!
//! No retry loops; a failure is reported to the caller, which treats it as
//! a miss.
//!
//! # Example
//!
//! ```rust,no_run
//! use nola_analytics::cache::CacheBackend;
//! use nola_analytics::redis::{RedisCache, RedisConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RedisConfig::with_url("redis://localhost:6379")
//!     .command_timeout(Duration::from_millis(500));
//! let cache = RedisCache::new(config).await?;
//! cache.set_ex("filtros:canais", "[]", Duration::from_secs(600)).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::util::{safe_redis_error, sanitize_url};
use crate::cache::{CacheBackend, CacheError};

/// Connection settings for the Redis cache
#[derive(Clone, Debug)]
pub struct RedisConfig {
    /// Redis server URL (e.g., "redis://localhost:6379/0")
    pub url: String,

    /// Timeout for establishing a connection
    /// Default: 2 seconds
    pub connection_timeout: Duration,

    /// Timeout for a single GET / SET
    /// Default: 1 second
    pub command_timeout: Duration,

    /// How long calls fail fast after a failed connect
    /// Default: 5 seconds
    pub reconnect_backoff: Duration,

    /// Connect with TLS (`rediss://`)
    /// Default: false
    pub tls_enabled: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            connection_timeout: Duration::from_secs(2),
            command_timeout: Duration::from_secs(1),
            reconnect_backoff: Duration::from_secs(5),
            tls_enabled: false,
        }
    }
}

impl RedisConfig {
    /// Create a config for the given URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the connection timeout
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the command timeout
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the reconnect backoff (zero retries on every call)
    pub fn reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    /// Enable or disable TLS
    pub fn tls(mut self, enabled: bool) -> Self {
        self.tls_enabled = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("Redis URL cannot be empty".to_string());
        }
        if self.connection_timeout.is_zero() || self.command_timeout.is_zero() {
            return Err("Redis timeouts must be greater than 0".to_string());
        }

        #[cfg(not(feature = "redis-tls"))]
        if self.tls_enabled {
            return Err(
                "TLS is enabled but the 'redis-tls' feature is not compiled".to_string(),
            );
        }

        if self.tls_enabled && !self.url.starts_with("rediss://") {
            return Err("TLS is enabled but URL doesn't use the 'rediss://' scheme".to_string());
        }
        if !self.tls_enabled && self.url.starts_with("rediss://") {
            return Err("URL uses 'rediss://' but TLS is not enabled".to_string());
        }

        Ok(())
    }
}

/// Redis-backed [`CacheBackend`]
pub struct RedisCache {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    /// Held for the duration of a connect attempt
    connect_lock: Mutex<()>,
    /// When the last connect attempt failed
    last_failure: parking_lot::Mutex<Option<Instant>>,
    config: RedisConfig,
}

impl RedisCache {
    /// Create the client and PING the server once
    ///
    /// Only an invalid configuration or URL is an error. An unreachable
    /// server is logged and retried on first use after the backoff.
    pub async fn new(config: RedisConfig) -> Result<Self, CacheError> {
        config.validate().map_err(CacheError::Unavailable)?;

        let client = Client::open(config.url.as_str())
            .map_err(|e| CacheError::Unavailable(safe_redis_error(&config.url, &e)))?;

        let cache = Self {
            client,
            connection: RwLock::new(None),
            connect_lock: Mutex::new(()),
            last_failure: parking_lot::Mutex::new(None),
            config,
        };

        match cache.ping().await {
            Ok(()) => debug!(url = %cache.display_url(), "Redis cache connected"),
            Err(e) => warn!(
                url = %cache.display_url(),
                error = %e,
                "Redis unreachable at startup, requests will bypass the cache until it recovers"
            ),
        }

        Ok(cache)
    }

    /// Redacted URL for display
    pub fn display_url(&self) -> String {
        sanitize_url(&self.config.url)
    }

    /// Fail fast while the last failed connect is within the backoff window
    fn check_backoff(&self, now: Instant) -> Result<(), CacheError> {
        match *self.last_failure.lock() {
            Some(failed_at) if now.duration_since(failed_at) < self.config.reconnect_backoff => {
                Err(CacheError::Unavailable(format!(
                    "reconnect to {} suppressed for {:?} after a failed connect",
                    self.display_url(),
                    self.config.reconnect_backoff
                )))
            },
            _ => Ok(()),
        }
    }

    fn mark_failed(&self) {
        *self.last_failure.lock() = Some(Instant::now());
    }

    /// Current handle, connecting first if there is none
    ///
    /// The RwLock is never held across the dial, so calls on a live handle
    /// are not blocked by a reconnect in progress.
    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        if let Some(conn) = self.connection.read().await.as_ref() {
            return Ok(conn.clone());
        }

        let started = Instant::now();
        self.check_backoff(started)?;

        let _dialing = self.connect_lock.lock().await;

        // Another caller finished a connect while we waited
        if let Some(conn) = self.connection.read().await.as_ref() {
            return Ok(conn.clone());
        }
        if matches!(*self.last_failure.lock(), Some(failed_at) if failed_at >= started) {
            return Err(CacheError::Unavailable(format!(
                "connect to {} failed while waiting",
                self.display_url()
            )));
        }

        let dialed = tokio::time::timeout(
            self.config.connection_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await;

        let conn = match dialed {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                self.mark_failed();
                return Err(CacheError::Unavailable(safe_redis_error(&self.config.url, &e)));
            },
            Err(_) => {
                self.mark_failed();
                return Err(CacheError::Timeout(self.config.connection_timeout));
            },
        };

        *self.last_failure.lock() = None;
        *self.connection.write().await = Some(conn.clone());
        Ok(conn)
    }

    /// Forget the handle so the next call reconnects
    async fn reset(&self) {
        *self.connection.write().await = None;
    }

    /// Run one command under the command timeout
    async fn run<T: redis::FromRedisValue>(&self, cmd: redis::Cmd) -> Result<T, CacheError> {
        let mut conn = self.connection().await?;

        let outcome: Result<redis::RedisResult<T>, _> =
            tokio::time::timeout(self.config.command_timeout, cmd.query_async(&mut conn)).await;

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                if e.is_io_error() || e.is_connection_dropped() {
                    self.reset().await;
                }
                Err(CacheError::Command(safe_redis_error(&self.config.url, &e)))
            },
            Err(_) => {
                // A hung server gets the same backoff as a refused connect
                self.reset().await;
                self.mark_failed();
                Err(CacheError::Timeout(self.config.command_timeout))
            },
        }
    }

    /// PING the server
    pub async fn ping(&self) -> Result<(), CacheError> {
        let reply: String = self.run(redis::cmd("PING")).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(CacheError::Command(format!("unexpected PING reply: {}", reply)))
        }
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.run(cmd).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut cmd = redis::cmd("SET");
        // Redis rejects EX 0
        cmd.arg(key).arg(value).arg("EX").arg(ttl.as_secs().max(1));
        self.run(cmd).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RedisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RedisConfig::with_url("redis://cache:6379/2")
            .connection_timeout(Duration::from_millis(250))
            .command_timeout(Duration::from_millis(100));
        assert_eq!(config.url, "redis://cache:6379/2");
        assert_eq!(config.connection_timeout, Duration::from_millis(250));
        assert_eq!(config.command_timeout, Duration::from_millis(100));
        assert!(!config.tls_enabled);
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        assert!(RedisConfig::with_url("").validate().is_err());
        assert!(RedisConfig::default()
            .command_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(RedisConfig::with_url("rediss://secure:6380")
            .validate()
            .is_err());
    }

    /// Accepts TCP connections and never answers, so the handshake hangs
    async fn spawn_silent_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        // Non-zero database forces a SELECT during the handshake
        format!("redis://{}/1", addr)
    }

    #[test]
    fn test_reconnect_backoff_builder() {
        assert_eq!(RedisConfig::default().reconnect_backoff, Duration::from_secs(5));
        let config = RedisConfig::default().reconnect_backoff(Duration::ZERO);
        assert_eq!(config.reconnect_backoff, Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_connect_attempt() {
        let connect_timeout = Duration::from_millis(400);
        let config = RedisConfig::with_url(spawn_silent_server().await)
            .connection_timeout(connect_timeout)
            .reconnect_backoff(Duration::ZERO);
        let cache = Arc::new(RedisCache::new(config).await.unwrap());

        let started = std::time::Instant::now();
        let calls: Vec<_> = (0..6)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get("analytics:any").await })
            })
            .collect();

        for call in calls {
            assert!(call.await.unwrap().is_err());
        }
        // Serialized dials would take six connect timeouts
        assert!(
            started.elapsed() < connect_timeout * 2,
            "calls took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn test_failed_connect_skips_dial_during_backoff() {
        let connect_timeout = Duration::from_millis(300);
        let config = RedisConfig::with_url(spawn_silent_server().await)
            .connection_timeout(connect_timeout)
            .reconnect_backoff(Duration::from_secs(60));
        // The startup PING fails and opens the backoff window
        let cache = RedisCache::new(config).await.unwrap();

        let started = std::time::Instant::now();
        let result = cache.get("analytics:any").await;
        assert!(matches!(result, Err(CacheError::Unavailable(_))));
        assert!(cache
            .set_ex("analytics:any", "[]", Duration::from_secs(1))
            .await
            .is_err());
        assert!(started.elapsed() < connect_timeout / 2);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_not_fatal() {
        // Port 1 on loopback refuses connections
        let config = RedisConfig::with_url("redis://127.0.0.1:1/0")
            .connection_timeout(Duration::from_millis(200))
            .reconnect_backoff(Duration::ZERO);
        let cache = RedisCache::new(config).await.expect("client builds");

        assert!(cache.get("analytics:any").await.is_err());
        assert!(cache
            .set_ex("analytics:any", "[]", Duration::from_secs(1))
            .await
            .is_err());
        assert_eq!(cache.display_url(), "redis://127.0.0.1:1/0");
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let result = RedisCache::new(RedisConfig::with_url("http://not-redis")).await;
        assert!(matches!(result, Err(CacheError::Unavailable(_))));
    }
}
