//! Effect Module
//!
//! Async handlers wrapped in a unit that announces every call's lifecycle.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;

use super::{Event, Subscription, UnitId};

/// Type-erased async handler shared by every clone of an effect.
pub type BoxedHandler<P, R, E> = Arc<dyn Fn(P) -> BoxFuture<'static, Result<R, E>> + Send + Sync>;

/// Payload of an effect's `done` event.
#[derive(Debug, Clone, PartialEq)]
pub struct Done<P, R> {
    pub params: P,
    pub result: R,
}

/// Payload of an effect's `fail` event.
#[derive(Debug, Clone, PartialEq)]
pub struct Fail<P, E> {
    pub params: P,
    pub error: E,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<R, E> {
    Done(R),
    Failed(E),
}

/// Payload of an effect's `finally` event.
#[derive(Debug, Clone, PartialEq)]
pub struct Settled<P, R, E> {
    pub params: P,
    pub outcome: Outcome<R, E>,
}

struct EffectInner<P, R, E> {
    id: UnitId,
    name: String,
    handler: BoxedHandler<P, R, E>,
    started: Event<P>,
    done: Event<Done<P, R>>,
    done_data: Event<R>,
    fail: Event<Fail<P, E>>,
    fail_data: Event<E>,
    finally: Event<Settled<P, R, E>>,
    pending: AtomicUsize,
}

// == Effect ==
/// A callable unit around an async handler.
///
/// Each call fires `started`, runs the handler, then fires either `done` and
/// `done_data` or `fail` and `fail_data`, and finally `finally`. The handler's
/// result is returned unchanged.
pub struct Effect<P, R, E> {
    inner: Arc<EffectInner<P, R, E>>,
}

impl<P, R, E> Clone for Effect<P, R, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, R, E> fmt::Debug for Effect<P, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("pending", &self.inner.pending.load(Ordering::SeqCst))
            .finish()
    }
}

impl<P, R, E> Effect<P, R, E>
where
    P: Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Creates an effect outside any domain.
    ///
    /// # Arguments
    /// * `name` - Unit name; lifecycle events are named `"{name}.done"` etc.
    /// * `handler` - The operation each call runs
    /// * `capacity` - Broadcast buffer for every lifecycle event
    pub fn new(name: impl Into<String>, handler: BoxedHandler<P, R, E>, capacity: usize) -> Self {
        let name = name.into();
        Self {
            inner: Arc::new(EffectInner {
                id: UnitId::next(),
                started: Event::new(format!("{}.started", name), capacity),
                done: Event::new(format!("{}.done", name), capacity),
                done_data: Event::new(format!("{}.done_data", name), capacity),
                fail: Event::new(format!("{}.fail", name), capacity),
                fail_data: Event::new(format!("{}.fail_data", name), capacity),
                finally: Event::new(format!("{}.finally", name), capacity),
                pending: AtomicUsize::new(0),
                handler,
                name,
            }),
        }
    }

    // == Call ==
    /// Runs the handler with `params` and reports the outcome to observers.
    pub async fn call(&self, params: P) -> Result<R, E> {
        let inner = &self.inner;
        inner.started.fire(params.clone());

        let result = {
            let _pending = PendingGuard::enter(&inner.pending);
            (inner.handler)(params.clone()).await
        };

        let outcome = match &result {
            Ok(value) => {
                inner.done.fire(Done {
                    params: params.clone(),
                    result: value.clone(),
                });
                inner.done_data.fire(value.clone());
                Outcome::Done(value.clone())
            }
            Err(error) => {
                inner.fail.fire(Fail {
                    params: params.clone(),
                    error: error.clone(),
                });
                inner.fail_data.fire(error.clone());
                Outcome::Failed(error.clone())
            }
        };
        inner.finally.fire(Settled { params, outcome });

        result
    }

    /// Runs `f` with the params of every call, as the call starts.
    pub fn watch<F>(&self, f: F) -> Subscription
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.inner.started.watch(f)
    }

    pub fn id(&self) -> UnitId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of calls whose handler has not settled yet.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> &Event<P> {
        &self.inner.started
    }

    pub fn done(&self) -> &Event<Done<P, R>> {
        &self.inner.done
    }

    pub fn done_data(&self) -> &Event<R> {
        &self.inner.done_data
    }

    pub fn fail(&self) -> &Event<Fail<P, E>> {
        &self.inner.fail
    }

    pub fn fail_data(&self) -> &Event<E> {
        &self.inner.fail_data
    }

    pub fn finally(&self) -> &Event<Settled<P, R, E>> {
        &self.inner.finally
    }
}

/// Counts a handler as pending for as long as it lives, even if the call
/// future is dropped mid-flight.
struct PendingGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> PendingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use parking_lot::Mutex;

    fn doubler() -> Effect<u32, u32, String> {
        let handler: BoxedHandler<u32, u32, String> = Arc::new(|n: u32| {
            async move {
                if n == 0 {
                    Err("zero".to_string())
                } else {
                    Ok(n * 2)
                }
            }
            .boxed()
        });
        Effect::new("doubler", handler, 16)
    }

    #[tokio::test]
    async fn test_call_returns_handler_result() {
        let fx = doubler();
        assert_eq!(fx.call(21).await, Ok(42));
        assert_eq!(fx.call(0).await, Err("zero".to_string()));
        assert_eq!(fx.pending(), 0);
    }

    #[tokio::test]
    async fn test_lifecycle_on_success() {
        let fx = doubler();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = Arc::clone(&log);
        fx.watch(move |p| l.lock().push(format!("started {}", p)));
        let l = Arc::clone(&log);
        fx.done().watch(move |d| l.lock().push(format!("done {} -> {}", d.params, d.result)));
        let l = Arc::clone(&log);
        fx.fail().watch(move |f| l.lock().push(format!("fail {}", f.params)));
        let l = Arc::clone(&log);
        fx.finally().watch(move |s| l.lock().push(format!("finally {}", s.params)));

        fx.call(5).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec!["started 5", "done 5 -> 10", "finally 5"]
        );
    }

    #[tokio::test]
    async fn test_lifecycle_on_failure() {
        let fx = doubler();
        let mut fail_rx = fx.fail_data().subscribe();
        let mut finally_rx = fx.finally().subscribe();

        let result = fx.call(0).await;

        assert!(result.is_err());
        assert_eq!(fail_rx.recv().await.unwrap(), "zero");
        let settled = finally_rx.recv().await.unwrap();
        assert_eq!(settled.params, 0);
        assert_eq!(settled.outcome, Outcome::Failed("zero".to_string()));
    }

    #[tokio::test]
    async fn test_pending_counts_in_flight_calls() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let gate = Arc::new(Mutex::new(Some(rx)));
        let handler: BoxedHandler<(), (), String> = Arc::new(move |_: ()| {
            let gate = gate.lock().take();
            async move {
                if let Some(rx) = gate {
                    let _ = rx.await;
                }
                Ok::<(), String>(())
            }
            .boxed()
        });
        let fx = Effect::new("gated", handler, 16);

        let call = tokio::spawn({
            let fx = fx.clone();
            async move { fx.call(()).await }
        });
        while fx.pending() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(fx.pending(), 1);

        tx.send(()).unwrap();
        call.await.unwrap().unwrap();
        assert_eq!(fx.pending(), 0);
    }
}
