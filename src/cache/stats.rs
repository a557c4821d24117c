//! Cache Statistics Module
//!
//! Tracks how a cached effect's calls were served.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Calls answered from a fresh entry
    pub hits: u64,
    /// Calls that had to run the handler (absent or stale entry)
    pub misses: u64,
    /// Misses caused by an entry past its freshness window
    pub expired: u64,
    /// Handler invocations that failed and were not stored
    pub failures: u64,
    /// Times the whole cache was cleared
    pub clears: u64,
    /// Current number of stored entries, stale ones included
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Record Hit ==
    /// Increments the hit counter.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    // == Record Miss ==
    /// Increments the miss counter.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Expired ==
    /// Counts a stale entry. Also counts as a miss.
    pub fn record_expired(&mut self) {
        self.expired += 1;
        self.misses += 1;
    }

    // == Record Failure ==
    /// Increments the failure counter.
    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    // == Record Clear ==
    /// Increments the clear counter.
    pub fn record_clear(&mut self) {
        self.clears += 1;
    }

    // == Update Entry Count ==
    /// Updates the total entries count.
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
