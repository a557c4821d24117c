//! Cache Entry Module
//!
//! A stored handler result together with the moment it was produced.

use std::time::Duration;

use chrono::{DateTime, Utc};

// == Cache Entry ==
/// Represents a single cached handler result.
#[derive(Debug, Clone)]
pub struct CacheEntry<R> {
    /// The handler's result
    pub value: R,
    /// When the handler settled with this value
    pub created_at: DateTime<Utc>,
}

impl<R> CacheEntry<R> {
    // == Constructor ==
    pub fn new(value: R, created_at: DateTime<Utc>) -> Self {
        Self { value, created_at }
    }

    // == Age ==
    /// Milliseconds elapsed between `created_at` and `now`.
    ///
    /// Negative when the clock was moved backwards.
    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.created_at).num_milliseconds()
    }

    // == Is Expired ==
    /// Checks if the entry is past its freshness window.
    ///
    /// Boundary condition: an entry whose age equals `expires_in` exactly is
    /// still fresh. Only a strictly greater age expires it.
    pub fn is_expired(&self, now: DateTime<Utc>, expires_in: Duration) -> bool {
        let window = i64::try_from(expires_in.as_millis()).unwrap_or(i64::MAX);
        self.age_ms(now) > window
    }
}
