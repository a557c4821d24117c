//! Domain Module
//!
//! Named namespaces that create units and remember what they created.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::{BoxedHandler, Effect, Event, UnitId};
use crate::config::DEFAULT_NOTIFICATION_CAPACITY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Event,
    Effect,
}

/// One unit created through a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRecord {
    pub id: UnitId,
    pub kind: UnitKind,
    /// Qualified name, `"{domain}/{unit}"`
    pub name: String,
}

struct DomainInner {
    id: UnitId,
    name: String,
    capacity: usize,
    history: RwLock<Vec<UnitRecord>>,
}

// == Domain ==
/// Grouping namespace for events and effects.
///
/// Clones refer to the same domain and share its history.
#[derive(Clone)]
pub struct Domain {
    inner: Arc<DomainInner>,
}

impl Domain {
    /// Creates a domain using the default broadcast capacity.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_NOTIFICATION_CAPACITY)
    }

    /// Creates a domain whose units buffer `capacity` broadcast payloads.
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(DomainInner {
                id: UnitId::next(),
                name: name.into(),
                capacity: capacity.max(1),
                history: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> UnitId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn notification_capacity(&self) -> usize {
        self.inner.capacity
    }

    // == Create Event ==
    /// Creates an event named `"{domain}/{name}"` and records it.
    pub fn create_event<T>(&self, name: &str) -> Event<T>
    where
        T: Clone + Send + 'static,
    {
        let event = Event::new(self.qualify(name), self.inner.capacity);
        self.record(event.id(), UnitKind::Event, event.name());
        event
    }

    // == Create Effect ==
    /// Creates an effect named `"{domain}/{name}"` and records it.
    pub fn create_effect<P, R, E>(&self, name: &str, handler: BoxedHandler<P, R, E>) -> Effect<P, R, E>
    where
        P: Clone + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        let effect = Effect::new(self.qualify(name), handler, self.inner.capacity);
        self.record(effect.id(), UnitKind::Effect, effect.name());
        effect
    }

    // == History ==
    /// Every unit created through this domain, oldest first.
    pub fn history(&self) -> Vec<UnitRecord> {
        self.inner.history.read().clone()
    }

    pub fn effects(&self) -> Vec<UnitRecord> {
        self.units_of(UnitKind::Effect)
    }

    pub fn events(&self) -> Vec<UnitRecord> {
        self.units_of(UnitKind::Event)
    }

    /// Whether the unit with `id` was created through this domain.
    pub fn contains(&self, id: UnitId) -> bool {
        self.inner.history.read().iter().any(|unit| unit.id == id)
    }

    fn units_of(&self, kind: UnitKind) -> Vec<UnitRecord> {
        self.inner
            .history
            .read()
            .iter()
            .filter(|unit| unit.kind == kind)
            .cloned()
            .collect()
    }

    fn qualify(&self, name: &str) -> String {
        format!("{}/{}", self.inner.name, name)
    }

    fn record(&self, id: UnitId, kind: UnitKind, name: &str) {
        debug!(domain = %self.inner.name, unit = %name, id = %id, ?kind, "Unit created");
        self.inner.history.write().push(UnitRecord {
            id,
            kind,
            name: name.to_string(),
        });
    }
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("units", &self.inner.history.read().len())
            .finish()
    }
}
