//! Cached Effect demo
//!
//! Runs a short scripted scenario against a simulated paginated fetch and
//! logs how each call was served.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cached_effect::{CachedEffectConfig, Config, Runtime};

#[derive(Debug, Clone, Serialize)]
struct PageQuery {
    offset: u32,
    limit: u32,
}

#[derive(Debug, Clone, Error)]
enum FetchError {
    #[error("page offset {0} is out of range")]
    OutOfRange(u32),
}

/// Simulated upstream with 50 items and some latency.
async fn fetch_page(query: PageQuery) -> Result<Vec<u32>, FetchError> {
    const TOTAL: u32 = 50;

    tokio::time::sleep(Duration::from_millis(50)).await;
    if query.offset >= TOTAL {
        return Err(FetchError::OutOfRange(query.offset));
    }
    let end = (query.offset + query.limit).min(TOTAL);
    Ok((query.offset..end).collect())
}

/// Main entry point for the demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build a runtime and a cached effect with a clear signal
/// 4. Issue calls that hit, miss, fail and get cleared
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cached_effect=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: default_expires_in_ms={}, notification_capacity={}, default_domain={}",
        config.default_expires_in_ms, config.notification_capacity, config.default_domain_name
    );

    let runtime = Runtime::new(config)?;
    let invalidate = runtime.create_event::<()>("invalidate");

    let upstream_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&upstream_calls);
    let fetch_fx = runtime.create_cached_effect(
        CachedEffectConfig::new(move |query: PageQuery| {
            counter.fetch_add(1, Ordering::SeqCst);
            fetch_page(query)
        })
        .name("fetch_page")
        .clear_on(invalidate.clone()),
    );

    fetch_fx.done().watch(|done| {
        info!(
            offset = done.params.offset,
            items = done.result.len(),
            "Page delivered"
        );
    });

    let first = PageQuery {
        offset: 0,
        limit: 10,
    };
    let second = PageQuery {
        offset: 10,
        limit: 10,
    };

    fetch_fx.call(first.clone()).await?;
    fetch_fx.call(first.clone()).await?;
    fetch_fx.call(second).await?;

    if let Err(error) = fetch_fx
        .call(PageQuery {
            offset: 100,
            limit: 10,
        })
        .await
    {
        info!(%error, "Fetch failed as expected");
    }

    invalidate.fire(());
    fetch_fx.call(first).await?;

    let stats = fetch_fx.stats();
    info!(
        upstream_calls = upstream_calls.load(Ordering::SeqCst),
        hits = stats.hits,
        misses = stats.misses,
        failures = stats.failures,
        clears = stats.clears,
        hit_rate = stats.hit_rate(),
        "Demo finished"
    );
    info!("Stats: {}", serde_json::to_string(&stats)?);

    Ok(())
}
