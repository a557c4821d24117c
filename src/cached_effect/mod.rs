//! Cached Effect Module
//!
//! Effects whose results are memoized per parameter set for a fixed
//! freshness window.
//!
//! Each call derives a [`CacheKey`] from its params. A fresh entry is
//! returned without running the handler; otherwise the handler runs and a
//! successful result is stored under the key. Failures are handed back as is
//! and never stored. Observers see the same `started`/`done`/`fail`/`finally`
//! sequence whether the call was served from the cache or not.
//!
//! Concurrent calls with the same key that both miss will both run the
//! handler; nothing is coalesced.

mod options;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheStats, SystemClock, TtlCache};
use crate::config::DEFAULT_EXPIRES_IN_MS;
use crate::unit::{
    BoxedHandler, Domain, Done, Effect, Event, Fail, Settled, Subscription, UnitId,
};

pub use options::{CachedEffectConfig, DEFAULT_EFFECT_NAME};

// == Cached Effect ==
/// An [`Effect`] with a private TTL cache in front of its handler.
///
/// Clones share the effect and the cache.
pub struct CachedEffect<P, R, E> {
    effect: Effect<P, R, E>,
    cache: Arc<TtlCache<R>>,
    cache_cleared: Event<usize>,
    domain: Domain,
    clear_signal: Option<Arc<ClearSignal>>,
}

/// Watcher on the clear trigger, detached when the last clone of the effect
/// is dropped.
struct ClearSignal {
    subscription: Option<Subscription>,
}

impl Drop for ClearSignal {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

impl<P, R, E> Clone for CachedEffect<P, R, E> {
    fn clone(&self) -> Self {
        Self {
            effect: self.effect.clone(),
            cache: Arc::clone(&self.cache),
            cache_cleared: self.cache_cleared.clone(),
            domain: self.domain.clone(),
            clear_signal: self.clear_signal.clone(),
        }
    }
}

impl<P, R, E> fmt::Debug for CachedEffect<P, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedEffect")
            .field("effect", &self.effect)
            .field("cache", &self.cache)
            .field("domain", &self.domain.name())
            .field("clear_signal", &self.clear_signal.is_some())
            .finish()
    }
}

/// Builds a cached effect, falling back to `default_domain` and the standard
/// five minute window for options the config leaves unset.
pub fn create_cached_effect<P, R, E>(
    config: CachedEffectConfig<P, R, E>,
    default_domain: &Domain,
) -> CachedEffect<P, R, E>
where
    P: Serialize + Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    CachedEffect::build(
        config,
        default_domain,
        Duration::from_millis(DEFAULT_EXPIRES_IN_MS),
    )
}

impl<P, R, E> CachedEffect<P, R, E>
where
    P: Serialize + Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    // == Build ==
    /// Resolves the config's unset options and wires the effect up.
    ///
    /// The cache is allocated here and belongs to this effect alone. When a
    /// clear trigger is configured, firing it empties the cache before the
    /// firing call returns and then fires [`CachedEffect::cache_cleared`].
    pub(crate) fn build(
        config: CachedEffectConfig<P, R, E>,
        default_domain: &Domain,
        default_expires_in: Duration,
    ) -> Self {
        let CachedEffectConfig {
            handler,
            domain,
            clear_on,
            expires_in,
            name,
            clock,
        } = config;

        let domain = domain.unwrap_or_else(|| default_domain.clone());
        let expires_in = expires_in.unwrap_or(default_expires_in);
        let name = name.unwrap_or_else(|| DEFAULT_EFFECT_NAME.to_string());
        let clock = clock.unwrap_or_else(|| Arc::new(SystemClock));

        let cache = Arc::new(TtlCache::new(expires_in, clock));
        let cache_cleared = domain.create_event::<usize>(&format!("{}.cache_cleared", name));

        let clear_signal = clear_on.map(|trigger| {
            let weak_cache = Arc::downgrade(&cache);
            let cleared = cache_cleared.clone();
            let unit = cleared.name().to_string();
            let subscription = trigger.on_fire(Box::new(move || {
                // The effect may be gone while the trigger lives on
                if let Some(cache) = weak_cache.upgrade() {
                    let removed = cache.clear();
                    info!(unit = %unit, removed, "Cache cleared by signal");
                    cleared.fire(removed);
                }
            }));
            Arc::new(ClearSignal {
                subscription: Some(subscription),
            })
        });

        let effect = domain.create_effect(&name, memoize(handler, Arc::clone(&cache)));

        info!(
            unit = %effect.name(),
            expires_in_ms = expires_in.as_millis() as u64,
            clear_signal = clear_signal.is_some(),
            "Cached effect created"
        );

        Self {
            effect,
            cache,
            cache_cleared,
            domain,
            clear_signal,
        }
    }

    // == Call ==
    /// Returns a fresh cached result for `params`, or runs the handler.
    pub async fn call(&self, params: P) -> Result<R, E> {
        self.effect.call(params).await
    }

    /// Runs `f` with the params of every call, hits included.
    pub fn watch<F>(&self, f: F) -> Subscription
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.effect.watch(f)
    }

    // == Accessors ==
    /// The underlying effect.
    pub fn effect(&self) -> &Effect<P, R, E> {
        &self.effect
    }

    /// Unit id of the underlying effect.
    pub fn id(&self) -> UnitId {
        self.effect.id()
    }

    /// Domain-qualified name, e.g. `"default/cached_effect"`.
    pub fn name(&self) -> &str {
        self.effect.name()
    }

    /// Domain the effect was registered in.
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Freshness window of every cached result.
    pub fn expires_in(&self) -> Duration {
        self.cache.expires_in()
    }

    /// Returns true if a clear trigger was configured.
    pub fn has_clear_signal(&self) -> bool {
        self.clear_signal.is_some()
    }

    // == Introspection ==
    /// How calls have been served so far.
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Stored entries, stale ones included.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Calls currently waiting on the handler.
    pub fn pending(&self) -> usize {
        self.effect.pending()
    }

    // == Lifecycle Events ==
    /// Fires with the params as each call starts.
    pub fn started(&self) -> &Event<P> {
        self.effect.started()
    }

    /// Fires with params and result after each successful call.
    pub fn done(&self) -> &Event<Done<P, R>> {
        self.effect.done()
    }

    /// Fires with the result alone after each successful call.
    pub fn done_data(&self) -> &Event<R> {
        self.effect.done_data()
    }

    /// Fires with params and error after each failed call.
    pub fn fail(&self) -> &Event<Fail<P, E>> {
        self.effect.fail()
    }

    /// Fires with the error alone after each failed call.
    pub fn fail_data(&self) -> &Event<E> {
        self.effect.fail_data()
    }

    /// Fires once per call with its outcome, success or not.
    pub fn finally(&self) -> &Event<Settled<P, R, E>> {
        self.effect.finally()
    }

    /// Fires with the number of removed entries after each clear.
    pub fn cache_cleared(&self) -> &Event<usize> {
        &self.cache_cleared
    }
}

// == Memoize ==
/// Puts `cache` in front of `handler`.
///
/// Params that fail to encode skip the cache entirely: the handler runs and
/// its result is returned but not stored.
fn memoize<P, R, E>(handler: BoxedHandler<P, R, E>, cache: Arc<TtlCache<R>>) -> BoxedHandler<P, R, E>
where
    P: Serialize + Send + 'static,
    R: Clone + Send + Sync + 'static,
    E: fmt::Display + Send + 'static,
{
    Arc::new(move |params: P| {
        let handler = Arc::clone(&handler);
        let cache = Arc::clone(&cache);

        async move {
            let key = match CacheKey::derive(&params) {
                Ok(key) => Some(key),
                Err(error) => {
                    warn!(%error, "Params cannot be cached; calling handler directly");
                    None
                }
            };

            if let Some(key) = &key {
                if let Some(value) = cache.get(key) {
                    debug!(%key, "Cache hit");
                    return Ok(value);
                }
                debug!(%key, "Cache miss");
            }

            let result = handler(params).await;

            match (&result, key) {
                (Ok(value), Some(key)) => {
                    debug!(%key, "Storing handler result");
                    cache.insert(key, value.clone());
                }
                (Ok(_), None) => {}
                (Err(error), _) => {
                    cache.record_failure();
                    warn!(%error, "Handler failed; nothing cached");
                }
            }

            result
        }
        .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(
        calls: &Arc<AtomicUsize>,
    ) -> impl Fn(u32) -> futures::future::Ready<Result<u32, String>> + Send + Sync + 'static {
        let calls = Arc::clone(calls);
        move |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(n * 2))
        }
    }

    #[tokio::test]
    async fn test_defaults_applied() {
        let domain = Domain::new("test");
        let calls = Arc::new(AtomicUsize::new(0));
        let fx = create_cached_effect(CachedEffectConfig::new(counting_handler(&calls)), &domain);

        assert_eq!(fx.expires_in(), Duration::from_millis(300_000));
        assert_eq!(fx.name(), "test/cached_effect");
        assert!(!fx.has_clear_signal());
        assert!(domain.contains(fx.id()));
        assert!(domain.contains(fx.cache_cleared().id()));
    }

    #[tokio::test]
    async fn test_hit_skips_handler() {
        let domain = Domain::new("test");
        let calls = Arc::new(AtomicUsize::new(0));
        let fx = create_cached_effect(CachedEffectConfig::new(counting_handler(&calls)), &domain);

        assert_eq!(fx.call(4).await, Ok(8));
        assert_eq!(fx.call(4).await, Ok(8));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = fx.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(fx.cached_len(), 1);
    }

    #[tokio::test]
    async fn test_stale_entry_is_refetched() {
        let domain = Domain::new("test");
        let clock = ManualClock::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let fx = create_cached_effect(
            CachedEffectConfig::new(counting_handler(&calls))
                .expires_in(Duration::from_millis(1_000))
                .clock(clock.clone()),
            &domain,
        );

        fx.call(1).await.unwrap();
        clock.advance(Duration::from_millis(1_000));
        fx.call(1).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_millis(1));
        fx.call(1).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(fx.stats().expired, 1);
        assert_eq!(fx.cached_len(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let domain = Domain::new("test");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let fx = create_cached_effect(
            CachedEffectConfig::from_fn(move |n: u32| {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                if attempt == 0 {
                    Err("upstream unavailable".to_string())
                } else {
                    Ok(n)
                }
            }),
            &domain,
        );

        assert_eq!(fx.call(9).await, Err("upstream unavailable".to_string()));
        assert_eq!(fx.cached_len(), 0);
        assert_eq!(fx.call(9).await, Ok(9));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(fx.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_clear_signal_empties_cache() {
        let domain = Domain::new("test");
        let clear = domain.create_event::<()>("clear");
        let calls = Arc::new(AtomicUsize::new(0));
        let fx = create_cached_effect(
            CachedEffectConfig::new(counting_handler(&calls)).clear_on(clear.clone()),
            &domain,
        );
        let mut cleared_rx = fx.cache_cleared().subscribe();

        fx.call(1).await.unwrap();
        fx.call(2).await.unwrap();
        clear.fire(());

        assert_eq!(fx.cached_len(), 0);
        assert_eq!(cleared_rx.recv().await.unwrap(), 2);

        fx.call(1).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(fx.stats().clears, 1);
    }

    #[tokio::test]
    async fn test_clear_signal_outlives_effect() {
        let domain = Domain::new("test");
        let clear = domain.create_event::<()>("clear");
        let calls = Arc::new(AtomicUsize::new(0));
        let fx = create_cached_effect(
            CachedEffectConfig::new(counting_handler(&calls)).clear_on(clear.clone()),
            &domain,
        );
        drop(fx);

        // Must not panic once the cache is gone
        clear.fire(());
    }

    #[tokio::test]
    async fn test_dropping_effect_detaches_clear_watcher() {
        let domain = Domain::new("test");
        let logout = domain.create_event::<()>("logout");
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let fx = create_cached_effect(
                CachedEffectConfig::new(counting_handler(&calls)).clear_on(logout.clone()),
                &domain,
            );
            fx.call(1).await.unwrap();
            assert_eq!(logout.watcher_count(), 1);
        }

        assert_eq!(logout.watcher_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 100);
    }

    #[tokio::test]
    async fn test_clear_watcher_lives_while_any_clone_does() {
        let domain = Domain::new("test");
        let logout = domain.create_event::<()>("logout");
        let calls = Arc::new(AtomicUsize::new(0));
        let fx = create_cached_effect(
            CachedEffectConfig::new(counting_handler(&calls)).clear_on(logout.clone()),
            &domain,
        );
        let other = fx.clone();

        drop(fx);
        assert_eq!(logout.watcher_count(), 1);

        other.call(2).await.unwrap();
        logout.fire(());
        assert_eq!(other.cached_len(), 0);

        drop(other);
        assert_eq!(logout.watcher_count(), 0);
    }

    #[tokio::test]
    async fn test_unencodable_params_bypass_cache() {
        let domain = Domain::new("test");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let fx = create_cached_effect(
            CachedEffectConfig::from_fn(move |params: HashMap<Vec<u8>, u32>| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<usize, String>(params.len())
            }),
            &domain,
        );

        let mut params = HashMap::new();
        params.insert(vec![1, 2, 3], 1);

        assert_eq!(fx.call(params.clone()).await, Ok(1));
        assert_eq!(fx.call(params).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(fx.cached_len(), 0);
    }

    #[tokio::test]
    async fn test_clones_share_cache() {
        let domain = Domain::new("test");
        let calls = Arc::new(AtomicUsize::new(0));
        let fx = create_cached_effect(CachedEffectConfig::new(counting_handler(&calls)), &domain);
        let other = fx.clone();

        fx.call(3).await.unwrap();
        other.call(3).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(other.id(), fx.id());
    }
}
