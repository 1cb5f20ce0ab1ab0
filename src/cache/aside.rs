//! Cache-aside policy
//!
//! [`CacheAside::get_or_compute`] looks a key up, returns the stored value on
//! a hit, and otherwise runs the caller's computation and stores its result
//! with a TTL. Only successful computations are stored.
//!
//! Backend failures never escape: a failed read is a miss, a failed write is
//! dropped, and an entry that no longer deserializes is recomputed. With the
//! backend down every request reaches the store and still gets its answer.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{CacheBackend, CacheKey};

/// Cache counters
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups served from the backend
    pub hits: AtomicU64,
    /// Lookups that fell through to the computation
    pub misses: AtomicU64,
    /// Backend calls that failed (reads and writes)
    pub backend_errors: AtomicU64,
    /// Values written to the backend
    pub stores: AtomicU64,
}

impl CacheStats {
    /// Copy the counters
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CacheStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStatsSnapshot {
    /// Lookups served from the backend
    pub hits: u64,
    /// Lookups that fell through to the computation
    pub misses: u64,
    /// Backend calls that failed
    pub backend_errors: u64,
    /// Values written to the backend
    pub stores: u64,
}

/// Cache-aside front for a [`CacheBackend`]
#[derive(Clone)]
pub struct CacheAside {
    backend: Arc<dyn CacheBackend>,
    stats: Arc<CacheStats>,
}

impl CacheAside {
    /// Wrap a backend
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            stats: Arc::new(CacheStats::default()),
        }
    }

    /// Name of the wrapped backend
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Counter snapshot
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Return the cached value for `key`, or compute, store and return it
    ///
    /// Errors from `compute` are returned unchanged and nothing is stored.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.lookup(key).await {
            return Ok(value);
        }

        let value = compute().await?;
        self.store(key, &value, ttl).await;
        Ok(value)
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        match self.backend.get(key.as_str()).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, "Cache HIT");
                    Some(value)
                },
                Err(e) => {
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                    None
                },
            },
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Cache MISS");
                None
            },
            Err(e) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                self.stats.backend_errors.fetch_add(1, Ordering::Relaxed);
                warn!(
                    key = %key,
                    backend = self.backend.name(),
                    error = %e,
                    "Cache read failed, treating as miss"
                );
                None
            },
        }
    }

    async fn store<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Result not serializable, skipping cache");
                return;
            },
        };

        match self.backend.set_ex(key.as_str(), &raw, ttl).await {
            Ok(()) => {
                self.stats.stores.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, ttl_secs = ttl.as_secs(), "Cache SET");
            },
            Err(e) => {
                self.stats.backend_errors.fetch_add(1, Ordering::Relaxed);
                warn!(
                    key = %key,
                    backend = self.backend.name(),
                    error = %e,
                    "Cache write failed, result not cached"
                );
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, DisabledCache, LocalCache};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    const TTL: Duration = Duration::from_secs(600);

    fn key() -> CacheKey {
        CacheKey::channels()
    }

    /// Backend that answers reads with a fixed raw value
    struct FixedBackend(&'static str);

    #[async_trait]
    impl CacheBackend for FixedBackend {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Ok(Some(self.0.to_string()))
        }

        async fn set_ex(&self, _: &str, _: &str, _: Duration) -> Result<(), CacheError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let cache = CacheAside::new(Arc::new(LocalCache::new(100)));
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        for _ in 0..3 {
            let value: Vec<i32> = cache
                .get_or_compute(&key(), TTL, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.stores, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_recomputed() {
        let cache = CacheAside::new(Arc::new(LocalCache::new(100)));
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let compute = move || async move { Ok::<_, String>(calls.fetch_add(1, Ordering::SeqCst)) };

        let first: usize = cache.get_or_compute(&key(), TTL, compute).await.unwrap();
        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        let cached: usize = cache.get_or_compute(&key(), TTL, compute).await.unwrap();
        assert_eq!(first, cached);

        tokio::time::advance(Duration::from_secs(2)).await;
        let fresh: usize = cache.get_or_compute(&key(), TTL, compute).await.unwrap();
        assert_eq!(fresh, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = CacheAside::new(Arc::new(LocalCache::new(100)));

        let err = cache
            .get_or_compute(&key(), TTL, || async { Err::<Vec<i32>, _>("store down") })
            .await
            .unwrap_err();
        assert_eq!(err, "store down");
        assert_eq!(cache.stats().stores, 0);

        let value: Vec<i32> = cache
            .get_or_compute(&key(), TTL, || async { Ok::<_, &str>(vec![7]) })
            .await
            .unwrap();
        assert_eq!(value, vec![7]);
    }

    #[tokio::test]
    async fn test_unavailable_backend_degrades_to_compute() {
        let cache = CacheAside::new(Arc::new(DisabledCache));
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        for _ in 0..2 {
            let value: String = cache
                .get_or_compute(&key(), TTL, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>("fresh".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "fresh");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.stores, 0);
        assert_eq!(stats.backend_errors, 4);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let cache = CacheAside::new(Arc::new(FixedBackend("{not json")));
        let value: Vec<u8> = cache
            .get_or_compute(&key(), TTL, || async { Ok::<_, String>(vec![4]) })
            .await
            .unwrap();
        assert_eq!(value, vec![4]);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_cached_empty_list_is_a_hit() {
        let cache = CacheAside::new(Arc::new(FixedBackend("[]")));
        let value: Vec<u8> = cache
            .get_or_compute(&key(), TTL, || async {
                Err::<Vec<u8>, _>("must not run")
            })
            .await
            .unwrap();
        assert!(value.is_empty());
    }
}
