//! Unit Module
//!
//! The reactive building blocks cached effects are made of: events that fan
//! payloads out to watchers, effects that run async handlers and announce
//! their lifecycle, and domains that group units under a name.

mod domain;
mod effect;
mod event;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub use domain::{Domain, UnitKind, UnitRecord};
pub use effect::{BoxedHandler, Done, Effect, Fail, Outcome, Settled};
pub use event::{ClearTrigger, Event, Subscription};

static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

// == Unit Id ==
/// Process-unique identifier handed to every event, effect and domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(u64);

impl UnitId {
    pub(crate) fn next() -> Self {
        Self(NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
