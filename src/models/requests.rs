//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::{SetOptions, MAX_KEY_LENGTH};

/// Request body for the SET operation (PUT /set)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// Any JSON value
    pub value: Value,
    /// Optional TTL in milliseconds; the cache default applies when absent
    #[serde(default)]
    pub ttl: Option<u64>,
    /// Tags replacing the key's current tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SetRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if let Some(msg) = validate_key(&self.key) {
            return Some(msg);
        }
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Some("Tags cannot be empty".to_string());
        }
        None
    }

    /// Splits the request into the options the cache expects.
    pub fn options(&self) -> SetOptions {
        SetOptions {
            ttl: self.ttl,
            tags: self.tags.clone(),
        }
    }
}

/// Request body for POST /invalidate
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    pub tags: Vec<String>,
}

impl InvalidateRequest {
    pub fn validate(&self) -> Option<String> {
        if self.tags.is_empty() {
            return Some("At least one tag is required".to_string());
        }
        None
    }
}

/// Shared key validation for body and path keys.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        ));
    }
    None
}
