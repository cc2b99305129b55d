//! In-Memory Backend Module
//!
//! Bounded key/value storage combining a HashMap with a recency index and
//! lazy plus eager TTL expiry.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{CacheBackend, CacheEntry, CacheStats, RecencyIndex};
use crate::error::Result;

// == Memory Store ==
/// Synchronous LRU + TTL storage. [`MemoryBackend`] wraps it behind a lock.
#[derive(Debug)]
pub struct MemoryStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Read/write order, oldest first
    recency: RecencyIndex,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_size: usize,
}

impl<V: Clone> MemoryStore<V> {
    // == Constructor ==
    /// Creates a store holding at most `max_size` entries (at least 1).
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            recency: RecencyIndex::new(),
            stats: CacheStats::new(),
            max_size: max_size.max(1),
        }
    }

    // == Set ==
    /// Stores a value, replacing any existing entry from scratch.
    ///
    /// Inserting a new key into a full store first evicts the least recently
    /// used entry. Returns the evicted key, if any.
    pub fn set(&mut self, key: String, value: V, ttl: u64) -> Option<String> {
        let existed = self.entries.remove(&key).is_some();
        self.recency.remove(&key);

        let mut evicted = None;
        if !existed && self.entries.len() >= self.max_size {
            if let Some(oldest) = self.recency.pop_oldest() {
                self.entries.remove(&oldest);
                self.stats.record_eviction();
                debug!(key = %oldest, "Evicted least recently used entry");
                evicted = Some(oldest);
            }
        }

        self.recency.touch(&key);
        self.entries.insert(key, CacheEntry::new(value, ttl));
        self.stats.record_set();
        self.stats.set_size(self.entries.len());
        evicted
    }

    // == Get ==
    /// Returns the value if present and live, recording one hit or one miss.
    ///
    /// An expired entry is removed and counted as a miss.
    pub fn get(&mut self, key: &str) -> Option<V> {
        if self.remove_if_expired(key) {
            self.stats.record_miss();
            return None;
        }

        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.record_access();
                let value = entry.value.clone();
                self.recency.touch(key);
                self.stats.record_hit();
                Some(value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Has ==
    /// Whether a live entry exists. Does not touch recency or hit counters.
    pub fn has(&mut self, key: &str) -> bool {
        !self.remove_if_expired(key) && self.entries.contains_key(key)
    }

    // == Delete ==
    /// Removes an entry. Returns true iff it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.recency.remove(key);
            self.stats.record_delete();
            self.stats.set_size(self.entries.len());
            true
        } else {
            false
        }
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
        self.stats.set_size(0);
    }

    // == Purge Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = crate::cache::current_timestamp_ms();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.remove(key);
            self.recency.remove(key);
        }

        self.stats.record_expirations(expired.len());
        self.stats.set_size(self.entries.len());
        expired.len()
    }

    // == Keys ==
    /// Live keys, least recently used first.
    pub fn keys(&mut self) -> Vec<String> {
        self.purge_expired();
        self.recency.iter().map(str::to_string).collect()
    }

    // == Size ==
    /// Number of live entries.
    pub fn size(&mut self) -> usize {
        self.purge_expired();
        self.entries.len()
    }

    /// Raw entry count, including expired entries not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Metadata for `key` without touching recency or counters.
    pub fn entry(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_size(self.entries.len());
        stats
    }

    fn remove_if_expired(&mut self, key: &str) -> bool {
        let expired = self
            .entries
            .get(key)
            .map(|entry| entry.is_expired())
            .unwrap_or(false);

        if expired {
            self.entries.remove(key);
            self.recency.remove(key);
            self.stats.record_expirations(1);
            self.stats.set_size(self.entries.len());
        }
        expired
    }
}

// == Memory Backend ==
/// Process-local [`CacheBackend`] over a locked [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryBackend {
    store: RwLock<MemoryStore<Value>>,
}

impl MemoryBackend {
    pub fn new(max_size: usize) -> Self {
        Self {
            store: RwLock::new(MemoryStore::new(max_size)),
        }
    }

    /// Runs the eager expiry sweep. Returns the number of entries removed.
    pub async fn purge_expired(&self) -> usize {
        self.store.write().await.purge_expired()
    }

    /// Access count of a stored entry, for diagnostics.
    pub async fn access_count(&self, key: &str) -> Option<u64> {
        self.store.read().await.entry(key).map(|e| e.access_count)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        // Write lock: a hit reorders recency and updates counters
        Ok(self.store.write().await.get(key))
    }

    async fn set(&self, key: &str, value: Value, ttl: u64) -> Result<()> {
        self.store.write().await.set(key.to_string(), value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.store.write().await.delete(key))
    }

    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.store.write().await.has(key))
    }

    async fn clear(&self) -> Result<()> {
        self.store.write().await.clear();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.store.write().await.keys())
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.store.write().await.size())
    }

    async fn stats(&self) -> Option<CacheStats> {
        Some(self.store.read().await.stats())
    }
}
