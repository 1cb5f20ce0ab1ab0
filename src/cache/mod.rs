//! Cache-aside layer for analytics results and filter lists
//!
//! - [`CacheBackend`]: async get / set-with-expiry over string keys and values
//! - [`CacheKey`]: deterministic key derivation from a request
//! - [`CacheAside`]: lookup, compute on miss, populate; backend failures are misses
//! - [`LocalCache`]: in-memory backend with TTL
//! - [`DisabledCache`]: backend that is never reachable
//!
//! The Redis backend lives in [`crate::redis`].

pub mod aside;
pub mod key;
pub mod local;

use std::time::Duration;

use async_trait::async_trait;

pub use crate::error::CacheError;
pub use aside::{CacheAside, CacheStats, CacheStatsSnapshot};
pub use key::CacheKey;
pub use local::LocalCache;

/// Key-value store with per-entry expiry
///
/// Values are opaque serialized strings. Implementations report every
/// failure as [`CacheError`]; callers decide whether that matters.
#[async_trait]
pub trait CacheBackend: Send + Sync + 'static {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Fetch a value, `Ok(None)` on a clean miss
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value that expires after `ttl`
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

/// Backend used when caching is switched off
///
/// Every call fails with [`CacheError::Unavailable`], which the cache-aside
/// layer turns into a permanent miss.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCache;

#[async_trait]
impl CacheBackend for DisabledCache {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("cache disabled".to_string()))
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("cache disabled".to_string()))
    }
}
