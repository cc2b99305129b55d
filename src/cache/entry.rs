//! Cache Entry Module
//!
//! Defines the record a backend keeps for each stored value.

use std::time::{SystemTime, UNIX_EPOCH};

// == Cache Entry ==
/// A stored value plus its expiry and access metadata.
///
/// Owned by the backend that stores it; callers only ever see `value`.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Time to live in milliseconds, 0 = never expires
    pub ttl: u64,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Number of successful reads since the entry was (re)written
    pub access_count: u64,
    /// Last read or write timestamp (Unix milliseconds)
    pub last_accessed: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a fresh entry stamped with the current time.
    pub fn new(value: V, ttl: u64) -> Self {
        let now = current_timestamp_ms();
        Self {
            value,
            ttl,
            created_at: now,
            access_count: 0,
            last_accessed: now,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// An entry with `ttl > 0` is expired once strictly more than `ttl`
    /// milliseconds have passed since creation.
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.ttl > 0 && now.saturating_sub(self.created_at) > self.ttl
    }

    // == Record Access ==
    /// Bumps the access counter and the last-accessed timestamp.
    pub fn record_access(&mut self) {
        self.access_count += 1;
        self.last_accessed = current_timestamp_ms();
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if the entry never expires.
    pub fn ttl_remaining_ms(&self) -> Option<u64> {
        if self.ttl == 0 {
            return None;
        }
        let elapsed = current_timestamp_ms().saturating_sub(self.created_at);
        Some(self.ttl.saturating_sub(elapsed))
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
