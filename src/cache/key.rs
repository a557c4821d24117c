//! Cache Key Module
//!
//! Derives deterministic cache keys from call parameters.
//!
//! Parameters are encoded through `serde_json::Value` and every JSON object is
//! rebuilt with its keys in sorted order before printing, so two structurally
//! equal payloads produce the same key no matter how their maps were filled.

use std::borrow::Borrow;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

// == Cache Key ==
/// Canonical JSON encoding of one set of call parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Encodes `params` into a key.
    ///
    /// `()` and `None` both encode as `null`, and so do non-finite floats:
    /// `Some(f64::NAN)` and `Some(f64::INFINITY)` share a key with `None`.
    /// Fails when the payload's
    /// `Serialize` impl fails or a map key cannot become a JSON string.
    pub fn derive<P: Serialize + ?Sized>(params: &P) -> Result<Self> {
        let value = serde_json::to_value(params)?;
        let encoded = serde_json::to_string(&canonicalize(value))?;
        Ok(Self(encoded))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Rebuilds every object with sorted keys, recursively.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(String, Value)> = map.into_iter().collect();
            fields.sort_by(|a, b| a.0.cmp(&b.0));

            let mut sorted = Map::new();
            for (name, field) in fields {
                sorted.insert(name, canonicalize(field));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
