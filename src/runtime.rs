//! Runtime Module
//!
//! One application instance: the loaded config plus the default domain that
//! units land in when their config names none.

use std::fmt;
use std::future::Future;

use serde::Serialize;
use tracing::info;

use crate::cached_effect::{CachedEffect, CachedEffectConfig};
use crate::config::Config;
use crate::error::Result;
use crate::unit::{Domain, Event};

// == Runtime ==
/// Owns the default domain and the defaults for every cached effect built
/// through it.
///
/// Default domains are never shared between runtimes.
#[derive(Debug, Clone)]
pub struct Runtime {
    config: Config,
    default_domain: Domain,
}

impl Runtime {
    // == Constructor ==
    /// Validates `config` and creates a fresh default domain.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: Config) -> Self {
        let default_domain =
            Domain::with_capacity(&config.default_domain_name, config.notification_capacity);
        info!(
            domain = %default_domain.name(),
            default_expires_in_ms = config.default_expires_in_ms,
            "Runtime initialized"
        );
        Self {
            config,
            default_domain,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn default_domain(&self) -> &Domain {
        &self.default_domain
    }

    /// Creates a named domain using this runtime's notification capacity.
    pub fn create_domain(&self, name: impl Into<String>) -> Domain {
        Domain::with_capacity(name, self.config.notification_capacity)
    }

    /// Creates an event in the default domain.
    pub fn create_event<T>(&self, name: &str) -> Event<T>
    where
        T: Clone + Send + 'static,
    {
        self.default_domain.create_event(name)
    }

    // == Cached Effects ==
    /// Builds a cached effect from a bare async handler with every option
    /// left at its default.
    pub fn cached_effect<P, R, E, F, Fut>(&self, handler: F) -> CachedEffect<P, R, E>
    where
        P: Serialize + Clone + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
        E: Clone + fmt::Display + Send + Sync + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
    {
        self.create_cached_effect(CachedEffectConfig::new(handler))
    }

    /// Builds a cached effect from a full config.
    ///
    /// Unset options fall back to the default domain and
    /// [`Config::default_expires_in`].
    pub fn create_cached_effect<P, R, E>(
        &self,
        config: CachedEffectConfig<P, R, E>,
    ) -> CachedEffect<P, R, E>
    where
        P: Serialize + Clone + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
        E: Clone + fmt::Display + Send + Sync + 'static,
    {
        CachedEffect::build(
            config,
            &self.default_domain,
            self.config.default_expires_in(),
        )
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::from_valid_config(Config::default())
    }
}
