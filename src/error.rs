//! Error types for cached effects
//!
//! Handler failures never pass through this enum: a cached effect hands the
//! handler's own error back to the caller untouched. These variants cover the
//! bookkeeping around it.

use thiserror::Error;

// == Error Enum ==
/// Errors raised while configuring a runtime or deriving cache keys.
#[derive(Error, Debug)]
pub enum Error {
    /// Parameters could not be encoded into a cache key
    #[error("Cannot derive cache key: {0}")]
    KeySerialization(#[from] serde_json::Error),

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == Result Type Alias ==
/// Convenience Result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_message() {
        let err = Error::InvalidConfig("notification_capacity must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: notification_capacity must be > 0"
        );
    }

    #[test]
    fn test_serde_error_converts() {
        let serde_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: Error = serde_err.into();
        assert!(matches!(err, Error::KeySerialization(_)));
        assert!(err.to_string().starts_with("Cannot derive cache key"));
    }
}
