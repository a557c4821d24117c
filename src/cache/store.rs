//! Cache Store Module
//!
//! Per-effect result store with lazy TTL expiration.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::{CacheEntry, CacheKey, CacheStats, Clock};

struct Inner<R> {
    entries: HashMap<CacheKey, CacheEntry<R>>,
    stats: CacheStats,
}

// == TTL Cache ==
/// Result store owned by exactly one cached effect.
///
/// Lookups never remove anything: a stale entry is reported as a miss and
/// stays in place until a fresh result overwrites it or the cache is cleared.
/// The lock is only held for the map operation itself.
pub struct TtlCache<R> {
    inner: Mutex<Inner<R>>,
    /// Freshness window for every entry
    expires_in: Duration,
    clock: Arc<dyn Clock>,
}

impl<R: Clone> TtlCache<R> {
    // == Constructor ==
    /// Creates an empty cache.
    ///
    /// # Arguments
    /// * `expires_in` - How long a stored result may be served
    /// * `clock` - Time source for stamping and aging entries
    pub fn new(expires_in: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                stats: CacheStats::new(),
            }),
            expires_in,
            clock,
        }
    }

    // == Get ==
    /// Returns a clone of the stored value if it is still fresh.
    pub fn get(&self, key: &CacheKey) -> Option<R> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let lookup = inner
            .entries
            .get(key)
            .map(|entry| (entry.is_expired(now, self.expires_in), entry.value.clone()));

        match lookup {
            Some((false, value)) => {
                inner.stats.record_hit();
                Some(value)
            }
            Some((true, _)) => {
                inner.stats.record_expired();
                None
            }
            None => {
                inner.stats.record_miss();
                None
            }
        }
    }

    // == Peek ==
    /// Returns the raw entry, stale or not, without touching statistics.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry<R>> {
        self.inner.lock().entries.get(key).cloned()
    }

    // == Insert ==
    /// Stores `value` under `key` stamped with the current time.
    ///
    /// Overwrites whatever was there.
    pub fn insert(&self, key: CacheKey, value: R) {
        let entry = CacheEntry::new(value, self.clock.now());
        let mut inner = self.inner.lock();
        inner.entries.insert(key, entry);
        let len = inner.entries.len();
        inner.stats.set_total_entries(len);
    }

    // == Clear ==
    /// Drops every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.stats.record_clear();
        inner.stats.set_total_entries(0);
        removed
    }

    // == Record Failure ==
    /// Counts a handler failure. Nothing is stored for it.
    pub fn record_failure(&self) {
        self.inner.lock().stats.record_failure();
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let mut stats = inner.stats.clone();
        stats.set_total_entries(inner.entries.len());
        stats
    }

    // == Accessors ==
    /// Freshness window applied to every entry.
    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

impl<R> fmt::Debug for TtlCache<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TtlCache")
            .field("entries", &inner.entries.len())
            .field("expires_in", &self.expires_in)
            .field("stats", &inner.stats)
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;

    fn key(s: &str) -> CacheKey {
        CacheKey::derive(s).unwrap()
    }

    fn store(expires_in_ms: u64) -> (TtlCache<String>, ManualClock) {
        let clock = ManualClock::default();
        let cache = TtlCache::new(
            Duration::from_millis(expires_in_ms),
            Arc::new(clock.clone()),
        );
        (cache, clock)
    }

    #[test]
    fn test_store_new() {
        let (cache, _) = store(1_000);
        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.expires_in(), Duration::from_millis(1_000));
    }

    #[test]
    fn test_store_insert_and_get() {
        let (cache, _) = store(1_000);

        cache.insert(key("page-1"), "value1".to_string());

        assert_eq!(cache.get(&key("page-1")), Some("value1".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let (cache, _) = store(1_000);
        assert_eq!(cache.get(&key("missing")), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_store_overwrite() {
        let (cache, clock) = store(1_000);

        cache.insert(key("k"), "value1".to_string());
        clock.advance(Duration::from_millis(400));
        cache.insert(key("k"), "value2".to_string());

        assert_eq!(cache.get(&key("k")), Some("value2".to_string()));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.peek(&key("k")).unwrap().created_at, clock.now());
    }

    #[test]
    fn test_store_lazy_expiration() {
        let (cache, clock) = store(1_000);
        cache.insert(key("k"), "value".to_string());

        clock.advance(Duration::from_millis(1_001));

        assert_eq!(cache.get(&key("k")), None);
        // Stale entry is not removed on read
        assert_eq!(cache.len(), 1);
        assert!(cache.peek(&key("k")).is_some());

        let stats = cache.stats();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_store_hit_keeps_created_at() {
        let (cache, clock) = store(10_000);
        cache.insert(key("k"), "value".to_string());
        let created_at = cache.peek(&key("k")).unwrap().created_at;

        for _ in 0..3 {
            clock.advance(Duration::from_millis(500));
            assert!(cache.get(&key("k")).is_some());
        }

        assert_eq!(cache.peek(&key("k")).unwrap().created_at, created_at);
        assert_eq!(cache.stats().hits, 3);
    }

    #[test]
    fn test_store_clear() {
        let (cache, _) = store(1_000);
        cache.insert(key("a"), "1".to_string());
        cache.insert(key("b"), "2".to_string());

        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key("a")), None);

        let stats = cache.stats();
        assert_eq!(stats.clears, 1);
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_store_record_failure() {
        let (cache, _) = store(1_000);
        cache.record_failure();
        assert_eq!(cache.stats().failures, 1);
        assert!(cache.is_empty());
    }
}
