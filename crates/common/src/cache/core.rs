//! TTL cache for successful responses
//!
//! Every entry carries its own TTL. Expired entries are never returned:
//! lookups drop them lazily and `sweep_expired` removes them in bulk.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

use super::config::CacheConfig;
use super::stats::{CacheStats, MetricsCollector};
use crate::resilience::{deadline_after, Clock, SharedClock, SystemClock};

/// Entry stored in the cache
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub data: V,
    pub timestamp: Instant,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
struct CacheStorage<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// Insertion order for `max_entries` eviction
    insertion_order: VecDeque<String>,
}

impl<V> CacheStorage<V> {
    fn new() -> Self {
        Self { entries: HashMap::new(), insertion_order: VecDeque::new() }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.insertion_order.retain(|k| k != key);
        Some(entry)
    }
}

/// Thread-safe TTL cache keyed by request identity
///
/// # Example
/// ```
/// use std::time::Duration;
///
/// use courier_common::cache::{CacheConfig, ResponseCache};
///
/// let cache: ResponseCache<String> = ResponseCache::new(CacheConfig::default());
/// cache.set("key", "value".to_string(), Duration::from_secs(60));
/// assert_eq!(cache.get("key"), Some("value".to_string()));
///
/// // A zero TTL is never stored
/// cache.set("other", "value".to_string(), Duration::ZERO);
/// assert!(!cache.has("other"));
/// ```
pub struct ResponseCache<V: Clone> {
    storage: RwLock<CacheStorage<V>>,
    config: CacheConfig,
    metrics: MetricsCollector,
    clock: SharedClock,
}

impl<V: Clone> fmt::Debug for ResponseCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}

impl<V: Clone> ResponseCache<V> {
    /// Create a new cache using the system clock
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a new cache with a custom clock (useful for testing)
    pub fn with_clock(config: CacheConfig, clock: SharedClock) -> Self {
        Self {
            storage: RwLock::new(CacheStorage::new()),
            config,
            metrics: MetricsCollector::default(),
            clock,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Store `data` under `key` for `ttl`
    ///
    /// Returns `false` without storing when `ttl` is zero. Replacing a key
    /// moves it to the back of the eviction order.
    pub fn set(&self, key: impl Into<String>, data: V, ttl: Duration) -> bool {
        let key = key.into();
        if ttl.is_zero() {
            self.metrics.record_skip();
            return false;
        }

        let now = self.clock.now();
        let mut storage = self.storage.write();
        storage.remove(&key);

        if let Some(max) = self.config.max_entries {
            while storage.entries.len() >= max {
                let Some(oldest) = storage.insertion_order.pop_front() else {
                    break;
                };
                storage.entries.remove(&oldest);
                self.metrics.record_eviction();
                debug!(key = %oldest, "evicted oldest cache entry");
            }
        }

        let expires_at = deadline_after(now, ttl);
        storage.entries.insert(key.clone(), CacheEntry { data, timestamp: now, expires_at });
        storage.insertion_order.push_back(key);
        self.metrics.record_insert();
        true
    }

    /// Get a live entry, dropping it if it has expired
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();

        {
            let storage = self.storage.read();
            match storage.entries.get(key) {
                None => {
                    self.metrics.record_miss();
                    return None;
                }
                Some(entry) if !entry.is_expired(now) => {
                    self.metrics.record_hit();
                    return Some(entry.data.clone());
                }
                Some(_) => {}
            }
        }

        self.drop_if_expired(key, now);
        self.metrics.record_miss();
        None
    }

    /// Whether a live entry exists (does not count as a hit or miss)
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now();
        let live = match self.storage.read().entries.get(key) {
            Some(entry) => !entry.is_expired(now),
            None => return false,
        };
        if !live {
            self.drop_if_expired(key, now);
        }
        live
    }

    pub fn delete(&self, key: &str) -> bool {
        self.storage.write().remove(key).is_some()
    }

    /// Remove every entry and reset statistics
    pub fn clear(&self) {
        let mut storage = self.storage.write();
        storage.entries.clear();
        storage.insertion_order.clear();
        self.metrics.reset();
    }

    /// Remove all expired entries, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut storage = self.storage.write();

        let before = storage.entries.len();
        storage.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - storage.entries.len();

        if removed > 0 {
            let CacheStorage { entries, insertion_order } = &mut *storage;
            insertion_order.retain(|key| entries.contains_key(key));
            self.metrics.record_expirations(removed);
            debug!(removed, "swept expired cache entries");
        }

        removed
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.storage.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len(), self.config.max_entries)
    }

    fn drop_if_expired(&self, key: &str, now: Instant) {
        let mut storage = self.storage.write();
        if storage.entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            storage.remove(key);
            self.metrics.record_expirations(1);
        }
    }
}
