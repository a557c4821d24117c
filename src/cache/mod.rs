//! Cache Module
//!
//! Typed result storage with lazy TTL expiration, keyed by canonical
//! parameter encodings.

mod clock;
mod entry;
mod key;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use key::CacheKey;
pub use stats::CacheStats;
pub use store::TtlCache;
