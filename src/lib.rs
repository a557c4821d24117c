//! Cached Effect - TTL memoization for async effects
//!
//! Wraps an async operation in an observable effect that serves repeated
//! calls with equal params from a per-effect cache until the entry goes
//! stale or an external event clears it.

pub mod cache;
pub mod cached_effect;
pub mod config;
pub mod error;
pub mod runtime;
pub mod unit;

pub use cached_effect::{create_cached_effect, CachedEffect, CachedEffectConfig};
pub use config::Config;
pub use runtime::Runtime;
pub use unit::{Domain, Event};
