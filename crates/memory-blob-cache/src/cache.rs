//! Bounded in-memory blob cache
//!
//! Payloads are stored under a stable content key and shared out as
//! `Arc<Vec<u8>>`. Eviction is size-based LRU. Concurrent fetches for the
//! same key are collapsed: the first caller performs the remote call, later
//! callers park on a oneshot channel and receive the same outcome.

use crate::error::{BlobError, Result};
use crate::remote::BlobRemote;
use crate::types::{CacheEntry, CacheStats};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::{debug, warn};

type FetchOutcome = Result<Arc<Vec<u8>>>;

struct Inner {
    entries: HashMap<String, CacheEntry>,
    /// Pending fetches: key -> waiters attached to the in-flight request.
    inflight: HashMap<String, Vec<oneshot::Sender<FetchOutcome>>>,
    total_size: u64,
    /// Logical clock driving LRU recency.
    clock: u64,
    stats: CacheStats,
}

/// Shared, bounded blob cache.
pub struct BlobCache {
    max_size: u64,
    inner: Mutex<Inner>,
}

impl BlobCache {
    /// Create a cache bounded to `max_size` bytes of payload data.
    pub fn new(max_size: u64) -> Self {
        Self {
            max_size,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                inflight: HashMap::new(),
                total_size: 0,
                clock: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a panic elsewhere; the map itself is
        // still structurally valid.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Synchronous lookup. Bumps LRU recency on hit.
    pub fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.clock += 1;
        let clock = inner.clock;
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = clock;
                inner.stats.hits += 1;
                Some(entry.data.clone())
            }
            None => {
                inner.stats.misses += 1;
                None
            }
        }
    }

    /// Fetch `locator` from the remote and store the payload under `key`,
    /// unless the key is already cached or a fetch for it is in flight.
    ///
    /// At most one remote call runs per key at a time; every concurrent
    /// caller receives the same payload or the same error. A failed fetch
    /// leaves the key absent so a later call can retry.
    pub async fn fetch_and_cache(
        &self,
        key: &str,
        locator: &str,
        remote: &dyn BlobRemote,
    ) -> FetchOutcome {
        enum Role {
            Hit(Arc<Vec<u8>>),
            Waiter(oneshot::Receiver<FetchOutcome>),
            Leader,
        }

        let role = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            inner.clock += 1;
            let clock = inner.clock;
            if let Some(entry) = inner.entries.get_mut(key) {
                entry.last_used = clock;
                inner.stats.hits += 1;
                Role::Hit(entry.data.clone())
            } else if let Some(waiters) = inner.inflight.get_mut(key) {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                inner.stats.coalesced += 1;
                Role::Waiter(rx)
            } else {
                inner.stats.misses += 1;
                inner.inflight.insert(key.to_string(), Vec::new());
                Role::Leader
            }
        };

        match role {
            Role::Hit(data) => Ok(data),
            Role::Waiter(rx) => match rx.await {
                Ok(outcome) => outcome,
                // Leader dropped without resolving (cancelled task).
                Err(_) => Err(BlobError::Aborted),
            },
            Role::Leader => {
                let guard = FlightGuard { cache: self, key };
                let outcome = match remote.fetch(locator).await {
                    Ok(data) => Ok(self.store(key, data)),
                    Err(e) => {
                        warn!(key, error = %e, "blob fetch failed");
                        Err(e)
                    }
                };
                guard.resolve(outcome.clone());
                outcome
            }
        }
    }

    /// Current statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let mut stats = inner.stats.clone();
        stats.entries = inner.entries.len();
        stats.total_size = inner.total_size;
        stats
    }

    /// Insert a payload, evicting least-recently-used entries to make room.
    /// Payloads larger than the whole cache are returned but never stored.
    fn store(&self, key: &str, data: Vec<u8>) -> Arc<Vec<u8>> {
        let data = Arc::new(data);
        let size = data.len() as u64;
        if size > self.max_size {
            debug!(key, size, max_size = self.max_size, "blob exceeds cache capacity, not stored");
            return data;
        }

        let mut guard = self.lock();
        let inner = &mut *guard;
        if let Some(old) = inner.entries.remove(key) {
            inner.total_size -= old.size();
        }
        while inner.total_size + size > self.max_size {
            let victim = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            match victim {
                Some(k) => {
                    if let Some(evicted) = inner.entries.remove(&k) {
                        inner.total_size -= evicted.size();
                        inner.stats.evictions += 1;
                        debug!(key = %k, "evicted blob");
                    }
                }
                None => break,
            }
        }
        inner.clock += 1;
        let clock = inner.clock;
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                data: data.clone(),
                last_used: clock,
            },
        );
        inner.total_size += size;
        data
    }

    /// Remove the in-flight record for `key` and hand `outcome` to every
    /// parked waiter.
    fn finish_flight(&self, key: &str, outcome: Option<FetchOutcome>) {
        let waiters = self.lock().inflight.remove(key).unwrap_or_default();
        if let Some(outcome) = outcome {
            for tx in waiters {
                let _ = tx.send(outcome.clone());
            }
        }
        // No outcome: the leader was dropped mid-fetch. Dropping the
        // senders wakes every waiter with BlobError::Aborted.
    }
}

/// Ensures waiters are released even if the leading fetch is cancelled.
struct FlightGuard<'a> {
    cache: &'a BlobCache,
    key: &'a str,
}

impl FlightGuard<'_> {
    fn resolve(self, outcome: FetchOutcome) {
        self.cache.finish_flight(self.key, Some(outcome));
        std::mem::forget(self);
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.cache.finish_flight(self.key, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct FakeRemote {
        fetches: AtomicUsize,
        fail: bool,
        gate: Option<Arc<Notify>>,
    }

    impl FakeRemote {
        fn new() -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                fail: false,
                gate: None,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new()
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BlobRemote for FakeRemote {
        async fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(ref gate) = self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(BlobError::Remote("remote unavailable".to_string()));
            }
            Ok(locator.as_bytes().to_vec())
        }
    }

    #[test]
    fn test_get_miss_then_stats() {
        let cache = BlobCache::new(1024);
        assert!(cache.get("img1.jpg").is_none());
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.entries, 0);
    }

    #[tokio::test]
    async fn test_fetch_and_cache_stores_payload() {
        let cache = BlobCache::new(1024);
        let remote = FakeRemote::new();

        let data = cache
            .fetch_and_cache("img1.jpg", "img1.jpg", &remote)
            .await
            .unwrap();
        assert_eq!(&*data, b"img1.jpg");
        assert_eq!(remote.fetch_count(), 1);

        // Second call is a pure cache hit.
        let again = cache
            .fetch_and_cache("img1.jpg", "img1.jpg", &remote)
            .await
            .unwrap();
        assert_eq!(again, data);
        assert_eq!(remote.fetch_count(), 1);

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_collapse_into_one() {
        let cache = Arc::new(BlobCache::new(1024));
        let gate = Arc::new(Notify::new());
        let remote = Arc::new(FakeRemote::gated(gate.clone()));

        let c1 = cache.clone();
        let r1 = remote.clone();
        let first =
            tokio::spawn(async move { c1.fetch_and_cache("img1.jpg", "img1.jpg", &*r1).await });

        // Let the leader register its flight before the second call arrives.
        tokio::task::yield_now().await;

        let c2 = cache.clone();
        let r2 = remote.clone();
        let second =
            tokio::spawn(async move { c2.fetch_and_cache("img1.jpg", "img1.jpg", &*r2).await });
        tokio::task::yield_now().await;

        gate.notify_waiters();

        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(remote.fetch_count(), 1);
        assert_eq!(cache.stats().coalesced, 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_fans_out_and_is_retryable() {
        let cache = BlobCache::new(1024);
        let failing = FakeRemote::failing();

        let err = cache
            .fetch_and_cache("img1.jpg", "img1.jpg", &failing)
            .await
            .unwrap_err();
        assert_eq!(err, BlobError::Remote("remote unavailable".to_string()));
        assert!(cache.get("img1.jpg").is_none());

        // Failure left the key absent; a later call issues a new fetch.
        let remote = FakeRemote::new();
        let data = cache
            .fetch_and_cache("img1.jpg", "img1.jpg", &remote)
            .await
            .unwrap();
        assert_eq!(&*data, b"img1.jpg");
        assert_eq!(remote.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_lru_eviction_under_pressure() {
        let cache = BlobCache::new(100);
        let remote = FakeRemote::new();

        // "aaaa..." is 60 bytes, "bbb..." is 30, "ccc..." is 30.
        let key_a = "a".repeat(60);
        let key_b = "b".repeat(30);
        let key_c = "c".repeat(30);

        cache.fetch_and_cache(&key_a, &key_a, &remote).await.unwrap();
        cache.fetch_and_cache(&key_b, &key_b, &remote).await.unwrap();

        // Touch A so B becomes the least recently used entry.
        assert!(cache.get(&key_a).is_some());

        cache.fetch_and_cache(&key_c, &key_c, &remote).await.unwrap();

        assert!(cache.get(&key_a).is_some());
        assert!(cache.get(&key_b).is_none());
        assert!(cache.get(&key_c).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_oversized_payload_returned_but_not_stored() {
        let cache = BlobCache::new(4);
        let remote = FakeRemote::new();

        let data = cache
            .fetch_and_cache("over-capacity", "over-capacity", &remote)
            .await
            .unwrap();
        assert_eq!(data.len(), 13);
        assert!(cache.get("over-capacity").is_none());
        assert_eq!(cache.stats().entries, 0);
    }
}
