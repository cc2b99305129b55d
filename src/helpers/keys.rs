//! Cache key derivation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;

/// Builds `"{prefix}:{base64(canonical json)}"` from structured parameters.
///
/// Object fields are sorted at every nesting level before encoding, so two
/// parameter sets that differ only in field order map to the same key.
pub fn generate_key<T: Serialize + ?Sized>(prefix: &str, params: &T) -> Result<String> {
    let canonical = canonicalize(serde_json::to_value(params)?);
    let json = serde_json::to_string(&canonical)?;
    Ok(format!("{}:{}", prefix, STANDARD.encode(json)))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(String, Value)> = map.into_iter().collect();
            fields.sort_by(|a, b| a.0.cmp(&b.0));
            let sorted: Map<String, Value> = fields
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
