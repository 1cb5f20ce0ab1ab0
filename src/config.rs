//! Configuration management for the analytics service
//!
//! TOML file support, environment variable overrides and defaults that match
//! the local development stack (PostgreSQL on 5433, Redis on 6379, the
//! dashboard dev server on 5173).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::redis::util::sanitize_url;
use crate::redis::RedisConfig;
use crate::store::PgStoreConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApplicationConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSection,

    /// PostgreSQL connection settings
    #[serde(default)]
    pub database: DatabaseSection,

    /// Redis connection settings
    #[serde(default)]
    pub redis: RedisSection,

    /// Cache policy
    #[serde(default)]
    pub cache: CacheSection,

    /// Security settings
    #[serde(default)]
    pub security: SecuritySection,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Log filter used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Row ceiling for dashboard analytics responses
    #[serde(default = "default_dashboard_row_limit")]
    pub dashboard_row_limit: u32,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseSection {
    /// Database host
    #[serde(default = "default_db_host")]
    pub host: String,

    /// Database port
    #[serde(default = "default_db_port")]
    pub port: u16,

    /// Database name
    #[serde(default = "default_db_name")]
    pub name: String,

    /// Login role
    #[serde(default = "default_db_user")]
    pub user: String,

    /// Login password
    #[serde(default = "default_db_password")]
    pub password: String,

    /// Pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Seconds a request waits for a pooled connection
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisSection {
    /// Use Redis as cache backend
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Redis URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connect timeout in seconds
    #[serde(default = "default_redis_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Per-command timeout in seconds
    #[serde(default = "default_redis_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Seconds to skip reconnect attempts after a failed connect
    #[serde(default = "default_redis_reconnect_backoff_secs")]
    pub reconnect_backoff_secs: u64,

    /// Connect with TLS (requires a `rediss://` URL)
    #[serde(default)]
    pub tls_enabled: bool,
}

/// Which cache backend the server runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Shared Redis instance
    Redis,
    /// Process-local map
    Memory,
    /// No caching, every request reaches the database
    Disabled,
}

/// Cache policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSection {
    /// Backend selection; `redis.enabled = false` downgrades `redis` to `disabled`
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackendKind,

    /// TTL for analytics results (seconds)
    #[serde(default = "default_short_ttl")]
    pub analytics_ttl_secs: u64,

    /// TTL for the channel and store lists (seconds)
    #[serde(default = "default_short_ttl")]
    pub filters_ttl_secs: u64,

    /// TTL for the weekday list (seconds)
    #[serde(default = "default_long_ttl")]
    pub weekdays_ttl_secs: u64,

    /// TTL for the customers-at-risk segment (seconds)
    #[serde(default = "default_long_ttl")]
    pub customers_ttl_secs: u64,

    /// Entry ceiling for the in-memory backend
    #[serde(default = "default_local_max_entries")]
    pub local_max_entries: usize,
}

/// Security configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecuritySection {
    /// CORS allowed origins (empty = allow any origin)
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: Vec<String>,
}

// Default value functions
fn default_listen_addr() -> String { "0.0.0.0:8000".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_dashboard_row_limit() -> u32 { 50 }
fn default_db_host() -> String { "localhost".to_string() }
fn default_db_port() -> u16 { 5433 }
fn default_db_name() -> String { "challenge_db".to_string() }
fn default_db_user() -> String { "challenge".to_string() }
fn default_db_password() -> String { "challenge_2024".to_string() }
fn default_max_connections() -> u32 { 10 }
fn default_acquire_timeout_secs() -> u64 { 5 }
fn default_redis_url() -> String { "redis://localhost:6379/0".to_string() }
fn default_redis_connection_timeout_secs() -> u64 { 2 }
fn default_redis_command_timeout_secs() -> u64 { 1 }
fn default_redis_reconnect_backoff_secs() -> u64 { 5 }
fn default_cache_backend() -> CacheBackendKind { CacheBackendKind::Redis }
fn default_short_ttl() -> u64 { 600 }
fn default_long_ttl() -> u64 { 3600 }
fn default_local_max_entries() -> usize { 10_000 }
fn default_cors_allowed_origins() -> Vec<String> { vec!["http://localhost:5173".to_string()] }
fn default_true() -> bool { true }

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            dashboard_row_limit: default_dashboard_row_limit(),
        }
    }
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            name: default_db_name(),
            user: default_db_user(),
            password: default_db_password(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

impl Default for RedisSection {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_redis_url(),
            connection_timeout_secs: default_redis_connection_timeout_secs(),
            command_timeout_secs: default_redis_command_timeout_secs(),
            reconnect_backoff_secs: default_redis_reconnect_backoff_secs(),
            tls_enabled: false,
        }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            analytics_ttl_secs: default_short_ttl(),
            filters_ttl_secs: default_short_ttl(),
            weekdays_ttl_secs: default_long_ttl(),
            customers_ttl_secs: default_long_ttl(),
            local_max_entries: default_local_max_entries(),
        }
    }
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            cors_allowed_origins: default_cors_allowed_origins(),
        }
    }
}

impl CacheSection {
    /// Analytics result TTL
    pub fn analytics_ttl(&self) -> Duration {
        Duration::from_secs(self.analytics_ttl_secs)
    }

    /// Channel and store list TTL
    pub fn filters_ttl(&self) -> Duration {
        Duration::from_secs(self.filters_ttl_secs)
    }

    /// Weekday list TTL
    pub fn weekdays_ttl(&self) -> Duration {
        Duration::from_secs(self.weekdays_ttl_secs)
    }

    /// Customers-at-risk TTL
    pub fn customers_ttl(&self) -> Duration {
        Duration::from_secs(self.customers_ttl_secs)
    }
}

impl ApplicationConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load_with_env(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Defaults with environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Database
        if let Ok(host) = std::env::var("DB_HOST") {
            self.database.host = host;
        }
        if let Ok(port) = std::env::var("DB_PORT") {
            self.database.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidEnv {
                    var: "DB_PORT".to_string(),
                    value: port.clone(),
                })?;
        }
        if let Ok(name) = std::env::var("DB_NAME") {
            self.database.name = name;
        }
        if let Ok(user) = std::env::var("DB_USER") {
            self.database.user = user;
        }
        if let Ok(password) = std::env::var("DB_PASSWORD") {
            self.database.password = password;
        }

        // Redis
        if let Ok(url) = std::env::var("REDIS_URL") {
            self.redis.url = url;
        }

        // Server
        if let Ok(addr) = std::env::var("NOLA_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.server.log_level = log_level;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listen_addr.is_empty() {
            return Err(ConfigError::Invalid("Listen address cannot be empty".to_string()));
        }
        if self.server.dashboard_row_limit == 0 {
            return Err(ConfigError::Invalid(
                "Dashboard row limit must be > 0".to_string(),
            ));
        }

        if self.database.host.is_empty() {
            return Err(ConfigError::Invalid("Database host cannot be empty".to_string()));
        }
        if self.database.port == 0 {
            return Err(ConfigError::Invalid("Database port cannot be 0".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "Database max_connections must be > 0".to_string(),
            ));
        }

        if self.effective_cache_backend() == CacheBackendKind::Redis {
            self.to_redis_config()
                .validate()
                .map_err(ConfigError::Invalid)?;
        }
        if self.cache.backend == CacheBackendKind::Memory && self.cache.local_max_entries == 0 {
            return Err(ConfigError::Invalid(
                "cache.local_max_entries must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Backend after applying `redis.enabled`
    pub fn effective_cache_backend(&self) -> CacheBackendKind {
        match self.cache.backend {
            CacheBackendKind::Redis if !self.redis.enabled => CacheBackendKind::Disabled,
            kind => kind,
        }
    }

    /// Store settings
    pub fn to_store_config(&self) -> PgStoreConfig {
        PgStoreConfig {
            host: self.database.host.clone(),
            port: self.database.port,
            database: self.database.name.clone(),
            user: self.database.user.clone(),
            password: self.database.password.clone(),
            max_connections: self.database.max_connections,
            acquire_timeout: Duration::from_secs(self.database.acquire_timeout_secs),
        }
    }

    /// Redis client settings
    pub fn to_redis_config(&self) -> RedisConfig {
        RedisConfig::with_url(self.redis.url.clone())
            .connection_timeout(Duration::from_secs(self.redis.connection_timeout_secs))
            .command_timeout(Duration::from_secs(self.redis.command_timeout_secs))
            .reconnect_backoff(Duration::from_secs(self.redis.reconnect_backoff_secs))
            .tls(self.redis.tls_enabled)
    }

    /// Human-readable summary with credentials redacted
    pub fn summary(&self) -> String {
        format!(
            "listen_addr={} database={}@{}:{}/{} pool={} cache={:?} redis={} cors={:?}",
            self.server.listen_addr,
            self.database.user,
            self.database.host,
            self.database.port,
            self.database.name,
            self.database.max_connections,
            self.effective_cache_backend(),
            sanitize_url(&self.redis.url),
            self.security.cors_allowed_origins,
        )
    }
}
