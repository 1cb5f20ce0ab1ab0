//! In-memory cache backend
//!
//! Process-local stand-in for Redis, selected with `cache.backend = "memory"`.
//! Useful for single-instance deployments and tests.
//!
//! # Features
//!
//! - TTL per entry, checked on read
//! - Expired entries purged before eviction
//! - Oldest-expiring entry evicted when at capacity
//! - Thread-safe with RwLock
//!
//! Expiry uses `tokio::time::Instant`, so paused-clock tests can advance past
//! a TTL without sleeping.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;

use super::{CacheBackend, CacheError};

/// Cached value with expiry deadline
#[derive(Clone, Debug)]
struct CachedValue {
    value: String,
    expires_at: Instant,
}

impl CachedValue {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Local in-memory cache with TTL and bounded size
pub struct LocalCache {
    entries: RwLock<HashMap<String, CachedValue>>,
    max_entries: usize,
}

impl LocalCache {
    /// Create a cache holding at most `max_entries` values
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Number of stored entries, expired ones included until purged
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl CacheBackend for LocalCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let entries = self.entries.read();
        Ok(entries
            .get(key)
            .filter(|cached| !cached.is_expired(now))
            .map(|cached| cached.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write();

        if entries.len() >= self.max_entries && !entries.contains_key(key) {
            entries.retain(|_, cached| !cached.is_expired(now));

            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, cached)| cached.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key.to_string(),
            CachedValue {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = LocalCache::new(10);
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set_ex("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires() {
        let cache = LocalCache::new(10);
        cache.set_ex("k", "v", Duration::from_secs(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cache.get("k").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_entry() {
        let cache = LocalCache::new(1);
        cache.set_ex("k", "a", Duration::from_secs(60)).await.unwrap();
        cache.set_ex("k", "b", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k").await.unwrap(), Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_evicts_soonest_expiring_at_capacity() {
        let cache = LocalCache::new(2);
        cache.set_ex("short", "1", Duration::from_secs(10)).await.unwrap();
        cache.set_ex("long", "2", Duration::from_secs(3600)).await.unwrap();
        cache.set_ex("new", "3", Duration::from_secs(600)).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.get("short").await.unwrap().is_none());
        assert!(cache.get("long").await.unwrap().is_some());
        assert!(cache.get("new").await.unwrap().is_some());
    }
}
