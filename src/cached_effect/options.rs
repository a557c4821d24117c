//! Cached effect configuration.
//!
//! Every way of describing a cached effect ends up as one
//! [`CachedEffectConfig`]; unset options are filled in when the effect is
//! built.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use crate::cache::Clock;
use crate::unit::{BoxedHandler, ClearTrigger, Domain};

/// Name given to cached effects that don't set one.
pub const DEFAULT_EFFECT_NAME: &str = "cached_effect";

// == Cached Effect Config ==
/// Handler plus options for one cached effect.
///
/// # Example
/// ```ignore
/// let config = CachedEffectConfig::new(fetch_page)
///     .name("fetch_page")
///     .expires_in(Duration::from_secs(60))
///     .clear_on(logout.clone());
/// let fetch_page_fx = runtime.create_cached_effect(config);
/// ```
pub struct CachedEffectConfig<P, R, E> {
    pub(crate) handler: BoxedHandler<P, R, E>,
    pub(crate) domain: Option<Domain>,
    pub(crate) clear_on: Option<Box<dyn ClearTrigger>>,
    pub(crate) expires_in: Option<Duration>,
    pub(crate) name: Option<String>,
    pub(crate) clock: Option<Arc<dyn Clock>>,
}

impl<P, R, E> CachedEffectConfig<P, R, E>
where
    P: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
{
    // == Constructors ==
    /// Wraps an async handler.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let handler: BoxedHandler<P, R, E> = Arc::new(move |params: P| handler(params).boxed());
        Self::from_boxed(handler)
    }

    /// Wraps a synchronous handler.
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(P) -> Result<R, E> + Send + Sync + 'static,
    {
        Self::new(move |params: P| futures::future::ready(handler(params)))
    }

    /// Uses an already boxed handler as is.
    pub fn from_boxed(handler: BoxedHandler<P, R, E>) -> Self {
        Self {
            handler,
            domain: None,
            clear_on: None,
            expires_in: None,
            name: None,
            clock: None,
        }
    }

    // == Options ==
    /// Registers the effect and its events in `domain` instead of the
    /// runtime's default one.
    pub fn domain(mut self, domain: &Domain) -> Self {
        self.domain = Some(domain.clone());
        self
    }

    /// Empties the cache each time `trigger` fires.
    pub fn clear_on(mut self, trigger: impl ClearTrigger + 'static) -> Self {
        self.clear_on = Some(Box::new(trigger));
        self
    }

    /// How long a stored result may be served.
    pub fn expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Time source for stamping and aging entries.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }
}
