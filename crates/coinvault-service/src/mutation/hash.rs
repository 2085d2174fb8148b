//! Request payload fingerprinting.
//!
//! The hash is SHA-256 over the canonical JSON encoding of the payload:
//! object keys sorted at every depth, no insignificant whitespace. Two
//! payloads that differ only in key order hash identically.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use coinvault_core::result::AppResult;

/// Hex SHA-256 of the canonical payload; `None` when there is no payload.
///
/// A JSON `null` counts as no payload.
pub fn request_hash(payload: Option<&Value>) -> AppResult<Option<String>> {
    let Some(payload) = payload.filter(|p| !p.is_null()) else {
        return Ok(None);
    };
    let canonical = serde_json::to_vec(&canonicalize(payload))?;
    Ok(Some(format!("{:x}", Sha256::digest(&canonical))))
}

/// Rebuild `value` with object keys inserted in sorted order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key.clone(), canonicalize(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
