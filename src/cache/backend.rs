//! Backend Contract
//!
//! The storage interface every cache backend implements.

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::CacheStats;
use crate::error::Result;

/// Storage behind a [`Cache`](crate::cache::Cache).
///
/// The contract is uniformly async so local and remote stores are
/// interchangeable. Values are opaque JSON documents; TTLs are milliseconds
/// with 0 meaning "never expires".
///
/// Implementations must never hand back an expired entry: `get` and `has`
/// check expiry on access, and `keys` and `size` prune before answering.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Returns the live value for `key`, or `None`. Absence is not an error.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous entry from scratch.
    async fn set(&self, key: &str, value: Value, ttl: u64) -> Result<()>;

    /// Removes `key`. Returns true iff a key was present and removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Whether a live (unexpired) entry exists for `key`.
    async fn has(&self, key: &str) -> Result<bool>;

    /// Removes every entry.
    async fn clear(&self) -> Result<()>;

    /// All live keys.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Number of live entries.
    async fn size(&self) -> Result<usize>;

    /// Running counters, for backends that keep them.
    async fn stats(&self) -> Option<CacheStats> {
        None
    }

    /// Called once by the composition root before first use.
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Called once on shutdown, e.g. to close a remote connection.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
