//! Thread-safe LRU + TTL store for per-tenant answers.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;

use crate::cache::key::CacheKey;
use crate::config::CacheConfig;
use crate::observability::metrics;

struct CacheEntry<V> {
    payload: V,
    stored_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) < ttl
    }
}

/// Snapshot of cache occupancy for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub ttl_seconds: u64,
}

/// Answer cache keyed by `(tenant, normalized query)`.
///
/// Every operation takes the same store-wide lock for its whole critical
/// section. Concurrent misses on the same key may both populate it; the last
/// write wins. Internal faults never surface: a poisoned lock is a miss.
pub struct ResponseCache<V> {
    entries: Mutex<LruCache<CacheKey, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_limits(config.max_size, Duration::from_secs(config.ttl_seconds))
    }

    pub fn with_limits(max_size: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn get(&self, tenant_id: &str, query: &str) -> Option<V> {
        self.get_at(tenant_id, query, Instant::now())
    }

    /// Look up a fresh entry, promoting it to most recently used.
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn get_at(&self, tenant_id: &str, query: &str, now: Instant) -> Option<V> {
        let key = CacheKey::new(tenant_id, query);
        let Ok(mut entries) = self.entries.lock() else {
            tracing::warn!(tenant = %tenant_id, "Response cache unavailable, treating as miss");
            metrics::record_cache_lookup("error");
            return None;
        };

        let freshness = entries.peek(&key).map(|entry| entry.is_fresh(now, self.ttl));
        match freshness {
            Some(true) => {
                let payload = entries.get(&key).map(|entry| entry.payload.clone());
                drop(entries);
                tracing::debug!(tenant = %tenant_id, "Cache hit");
                metrics::record_cache_lookup("hit");
                payload
            }
            Some(false) => {
                entries.pop(&key);
                let remaining = entries.len();
                drop(entries);
                tracing::debug!(tenant = %tenant_id, "Cache entry expired");
                metrics::record_cache_lookup("expired");
                metrics::record_cache_size(remaining);
                None
            }
            None => {
                drop(entries);
                metrics::record_cache_lookup("miss");
                None
            }
        }
    }

    pub fn put(&self, tenant_id: &str, query: &str, payload: V) {
        self.put_at(tenant_id, query, payload, Instant::now())
    }

    /// Store or overwrite an entry, evicting the least recently used entry
    /// when the store is full.
    pub fn put_at(&self, tenant_id: &str, query: &str, payload: V, now: Instant) {
        let key = CacheKey::new(tenant_id, query);
        let entry = CacheEntry {
            payload,
            stored_at: now,
        };

        let Ok(mut entries) = self.entries.lock() else {
            tracing::warn!(tenant = %tenant_id, "Response cache unavailable, skipping store");
            return;
        };

        let displaced = entries.push(key.clone(), entry);
        let size = entries.len();
        drop(entries);

        if let Some((evicted, _)) = displaced {
            if evicted != key {
                tracing::debug!(evicted_tenant = %evicted.tenant(), "Evicted least recently used answer");
                metrics::record_cache_eviction();
            }
        }
        metrics::record_cache_size(size);
    }

    /// Drop every entry derived from `tenant_id`. Returns how many were removed.
    pub fn invalidate_tenant(&self, tenant_id: &str) -> usize {
        // Stale answers are a correctness bug, so recover a poisoned store.
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let doomed: Vec<CacheKey> = entries
            .iter()
            .filter(|(key, _)| key.belongs_to(tenant_id))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        let size = entries.len();
        drop(entries);

        tracing::info!(tenant = %tenant_id, removed = doomed.len(), "Invalidated tenant cache");
        metrics::record_cache_invalidation(doomed.len());
        metrics::record_cache_size(size);
        doomed.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().map(|e| e.cap().get()).unwrap_or(0)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            capacity: self.capacity(),
            ttl_seconds: self.ttl.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max_size: usize) -> ResponseCache<String> {
        ResponseCache::with_limits(max_size, Duration::from_secs(60))
    }

    #[test]
    fn test_set_and_get() {
        let cache = cache(10);
        cache.put("cust1", "q1", "a1".to_string());

        assert_eq!(cache.get("cust1", "q1").as_deref(), Some("a1"));
        assert_eq!(cache.get("cust1", " Q1 ").as_deref(), Some("a1"));
        assert_eq!(cache.get("cust1", "q2"), None);
        assert_eq!(cache.get("cust2", "q1"), None);
    }

    #[test]
    fn test_inserting_past_capacity_evicts_first_key() {
        let cache = cache(3);
        for q in ["q0", "q1", "q2", "q3"] {
            cache.put("c", q, q.to_string());
        }

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("c", "q0"), None);
        for q in ["q1", "q2", "q3"] {
            assert_eq!(cache.get("c", q).as_deref(), Some(q));
        }
    }

    #[test]
    fn test_read_protects_from_eviction() {
        let cache = cache(2);
        cache.put("c", "q1", "a1".to_string());
        cache.put("c", "q2", "a2".to_string());

        cache.get("c", "q1");
        cache.put("c", "q3", "a3".to_string());

        assert_eq!(cache.get("c", "q2"), None);
        assert_eq!(cache.get("c", "q1").as_deref(), Some("a1"));
        assert_eq!(cache.get("c", "q3").as_deref(), Some("a3"));
    }

    #[test]
    fn test_update_existing_key_promotes_without_evicting() {
        let cache = cache(2);
        cache.put("c", "q1", "a1".to_string());
        cache.put("c", "q2", "a2".to_string());

        cache.put("c", "q2", "a2_new".to_string());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("c", "q1").as_deref(), Some("a1"));

        cache.put("c", "q1", "a1_new".to_string());
        cache.put("c", "q3", "a3".to_string());

        assert_eq!(cache.get("c", "q2"), None);
        assert_eq!(cache.get("c", "q1").as_deref(), Some("a1_new"));
        assert_eq!(cache.get("c", "q3").as_deref(), Some("a3"));
    }

    #[test]
    fn test_max_size_one() {
        let cache = cache(1);
        cache.put("c", "q1", "a1".to_string());
        cache.put("c", "q2", "a2".to_string());

        assert_eq!(cache.get("c", "q1"), None);
        assert_eq!(cache.get("c", "q2").as_deref(), Some("a2"));
    }

    #[test]
    fn test_expired_entry_is_removed() {
        let cache = ResponseCache::with_limits(10, Duration::from_secs(300));
        let stored = Instant::now();
        cache.put_at("c", "q1", "a1".to_string(), stored);
        cache.put_at("c", "q2", "a2".to_string(), stored);

        assert_eq!(
            cache.get_at("c", "q1", stored + Duration::from_secs(299)).as_deref(),
            Some("a1")
        );
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.get_at("c", "q1", stored + Duration::from_secs(300)), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_tenant_is_isolated() {
        let cache = cache(10);
        cache.put("A", "q1", "a1".to_string());
        cache.put("A", "q2", "a2".to_string());
        cache.put("B", "q1", "b1".to_string());
        cache.put("A:sub", "q1", "s1".to_string());

        assert_eq!(cache.invalidate_tenant("A"), 2);

        cache.put("B", "q2", "b2".to_string());
        assert_eq!(cache.get("A", "q1"), None);
        assert_eq!(cache.get("A", "q2"), None);
        assert_eq!(cache.get("B", "q1").as_deref(), Some("b1"));
        assert_eq!(cache.get("B", "q2").as_deref(), Some("b2"));
        assert_eq!(cache.get("A:sub", "q1").as_deref(), Some("s1"));
    }

    #[test]
    fn test_invalidate_unknown_tenant_is_noop() {
        let cache = cache(4);
        cache.put("A", "q1", "a1".to_string());
        assert_eq!(cache.invalidate_tenant("Z"), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stats() {
        let cache = cache(5);
        cache.put("A", "q1", "a1".to_string());
        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.capacity, 5);
        assert_eq!(stats.ttl_seconds, 60);
        assert!(!cache.is_empty());
    }
}
