//! Event Module
//!
//! Named signals with synchronous watchers and a broadcast tap.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::UnitId;
use crate::config::MAX_NOTIFICATION_CAPACITY;

type Watcher<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct EventInner<T> {
    id: UnitId,
    name: String,
    watchers: RwLock<Vec<(u64, Watcher<T>)>>,
    next_watcher: AtomicU64,
    sender: broadcast::Sender<T>,
}

// == Event ==
/// A named signal carrying payloads of type `T`.
///
/// Firing runs every watcher in registration order before returning, then
/// publishes the payload to broadcast subscribers. Clones refer to the same
/// event.
pub struct Event<T> {
    inner: Arc<EventInner<T>>,
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("watchers", &self.inner.watchers.read().len())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Event<T> {
    /// Creates a standalone event.
    ///
    /// # Arguments
    /// * `name` - Name used in logs and domain history
    /// * `capacity` - Buffer size of the broadcast channel, clamped to
    ///   `1..=MAX_NOTIFICATION_CAPACITY`
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.clamp(1, MAX_NOTIFICATION_CAPACITY));
        Self {
            inner: Arc::new(EventInner {
                id: UnitId::next(),
                name: name.into(),
                watchers: RwLock::new(Vec::new()),
                next_watcher: AtomicU64::new(0),
                sender,
            }),
        }
    }

    pub fn id(&self) -> UnitId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    // == Fire ==
    /// Delivers `payload` to every watcher, then to broadcast subscribers.
    ///
    /// Watchers may fire other events or register new watchers; the ones added
    /// during this call only see later payloads.
    pub fn fire(&self, payload: T) {
        let watchers: Vec<Watcher<T>> = self
            .inner
            .watchers
            .read()
            .iter()
            .map(|(_, watcher)| Arc::clone(watcher))
            .collect();

        for watcher in &watchers {
            watcher(&payload);
        }

        // No receivers is fine
        let _ = self.inner.sender.send(payload);
    }

    // == Watch ==
    /// Runs `f` on every future payload until the subscription is dropped
    /// through [`Subscription::unsubscribe`].
    pub fn watch<F>(&self, f: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let watcher_id = self.inner.next_watcher.fetch_add(1, Ordering::Relaxed);
        self.inner.watchers.write().push((watcher_id, Arc::new(f)));

        let event: Weak<EventInner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(event) = event.upgrade() {
                event.watchers.write().retain(|(id, _)| *id != watcher_id);
            }
        })
    }

    /// Receiver for payloads fired from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.inner.sender.subscribe()
    }

    // == Forward ==
    /// Fires `target` with `map(payload)` every time this event fires.
    pub fn forward_to<U, F>(&self, target: &Event<U>, map: F) -> Subscription
    where
        U: Clone + Send + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let target = target.clone();
        self.watch(move |payload| target.fire(map(payload)))
    }

    pub fn watcher_count(&self) -> usize {
        self.inner.watchers.read().len()
    }
}

// == Subscription ==
/// Handle to a registered watcher.
///
/// Dropping the handle keeps the watcher attached; call
/// [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new<F>(detach: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Removes the watcher. A no-op if the event is gone.
    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

// == Clear Trigger ==
/// Anything that can tell a cached effect to drop its cache.
pub trait ClearTrigger: Send + Sync {
    /// Arranges for `action` to run each time the trigger fires.
    fn on_fire(&self, action: Box<dyn Fn() + Send + Sync>) -> Subscription;
}

impl<T: Clone + Send + 'static> ClearTrigger for Event<T> {
    fn on_fire(&self, action: Box<dyn Fn() + Send + Sync>) -> Subscription {
        self.watch(move |_| action())
    }
}
