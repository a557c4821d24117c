//! Configuration Module
//!
//! Handles loading runtime defaults from environment variables.

use std::env;
use std::time::Duration;

use crate::error::{Error, Result};

/// Freshness window applied when neither the effect nor the config sets one.
pub const DEFAULT_EXPIRES_IN_MS: u64 = 300_000;

/// Buffer size of each unit's broadcast channel.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 1024;

/// Largest broadcast buffer an event may allocate. Every slot is allocated
/// up front.
pub const MAX_NOTIFICATION_CAPACITY: usize = 65_536;

/// Name given to a runtime's default domain.
pub const DEFAULT_DOMAIN_NAME: &str = "default";

/// Runtime configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Freshness window in milliseconds for effects that don't set their own
    pub default_expires_in_ms: u64,
    /// Capacity of the broadcast channel behind every event
    pub notification_capacity: usize,
    /// Name of the domain units land in when none is supplied
    pub default_domain_name: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DEFAULT_EXPIRES_IN_MS` - Freshness window in ms (default: 300000)
    /// - `NOTIFICATION_CAPACITY` - Broadcast buffer per event (default: 1024)
    /// - `DEFAULT_DOMAIN_NAME` - Name of the runtime's default domain (default: "default")
    pub fn from_env() -> Self {
        Self {
            default_expires_in_ms: env::var("DEFAULT_EXPIRES_IN_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_EXPIRES_IN_MS),
            notification_capacity: env::var("NOTIFICATION_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_NOTIFICATION_CAPACITY),
            default_domain_name: env::var("DEFAULT_DOMAIN_NAME")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DOMAIN_NAME.to_string()),
        }
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.notification_capacity == 0 {
            return Err(Error::InvalidConfig(
                "notification_capacity must be greater than 0".to_string(),
            ));
        }
        if self.notification_capacity > MAX_NOTIFICATION_CAPACITY {
            return Err(Error::InvalidConfig(format!(
                "notification_capacity must be at most {}, got {}",
                MAX_NOTIFICATION_CAPACITY, self.notification_capacity
            )));
        }
        if self.default_domain_name.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "default_domain_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Default freshness window as a [`Duration`].
    pub fn default_expires_in(&self) -> Duration {
        Duration::from_millis(self.default_expires_in_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_expires_in_ms: DEFAULT_EXPIRES_IN_MS,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            default_domain_name: DEFAULT_DOMAIN_NAME.to_string(),
        }
    }
}
