//! Remote Backend Module
//!
//! Adapts any external key-value store to the [`CacheBackend`] contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::cache::CacheBackend;
use crate::error::{CacheError, Result};

/// Primitives a remote key-value store must offer.
///
/// Connection management and the wire protocol belong to the implementor.
/// Keys passed here are already namespaced by [`RemoteBackend`].
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value`, expiring after `expiry_ms` milliseconds when given.
    async fn set_ex(&self, key: &str, value: String, expiry_ms: Option<u64>) -> Result<()>;

    /// Returns the number of keys removed.
    async fn del(&self, keys: &[String]) -> Result<u64>;

    /// Glob-style key listing, e.g. `cache:*`. Metacharacters in the literal
    /// part arrive backslash-escaped.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Drops everything in the store.
    async fn flush(&self) -> Result<()>;

    /// Closes the connection.
    async fn quit(&self) -> Result<()> {
        Ok(())
    }
}

/// [`CacheBackend`] that namespaces keys and JSON-encodes values into a
/// [`RemoteStore`]. Expiry is delegated to the store.
pub struct RemoteBackend {
    store: Arc<dyn RemoteStore>,
    prefix: String,
}

impl RemoteBackend {
    pub fn new(store: Arc<dyn RemoteStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Glob matching the namespace. Metacharacters in the prefix are escaped
    /// so listing never reaches outside it.
    fn pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.prefix.len() + 1);
        for c in self.prefix.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('*');
        pattern
    }

    /// Namespaced keys, filtered again in case the store's glob is looser.
    async fn raw_keys(&self) -> Result<Vec<String>> {
        let mut keys = self.store.keys(&self.pattern()).await?;
        keys.retain(|k| k.starts_with(&self.prefix));
        Ok(keys)
    }
}

#[async_trait]
impl CacheBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        match self.store.get(&self.namespaced(key)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: u64) -> Result<()> {
        let raw = serde_json::to_string(&value)?;
        let expiry = (ttl > 0).then_some(ttl);
        self.store.set_ex(&self.namespaced(key), raw, expiry).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let removed = self.store.del(&[self.namespaced(key)]).await?;
        Ok(removed > 0)
    }

    async fn has(&self, key: &str) -> Result<bool> {
        self.store.exists(&self.namespaced(key)).await
    }

    async fn clear(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return self.store.flush().await;
        }
        let keys = self.raw_keys().await?;
        if keys.is_empty() {
            return Ok(());
        }
        let removed = self.store.del(&keys).await?;
        debug!(removed, prefix = %self.prefix, "Cleared remote namespace");
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let keys = self.raw_keys().await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .collect())
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.raw_keys().await?.len())
    }

    async fn init(&self) -> Result<()> {
        // Round-trip a cheap call so a dead store shows up at startup
        self.store
            .exists(&self.namespaced("__ping__"))
            .await
            .map(|_| ())
            .map_err(|e| CacheError::Backend(format!("remote store unreachable: {}", e)))
    }

    async fn shutdown(&self) -> Result<()> {
        self.store.quit().await
    }
}
