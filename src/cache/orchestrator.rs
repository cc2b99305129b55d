//! Cache Orchestrator
//!
//! The [`Cache`] façade: delegates storage to a backend and layers tag
//! indexing, cache-aside, batch operations and warm-up on top.

use std::future::Future;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{CacheBackend, CacheStats, MemoryBackend, RemoteBackend, RemoteStore, TagIndex};
use crate::config::{CacheType, Config};
use crate::error::{CacheError, Result};

// == Set Options ==
/// Per-write options. A missing `ttl` falls back to the cache default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// TTL in milliseconds, 0 = never expires
    pub ttl: Option<u64>,
    /// Tags replacing the key's previous tags; empty leaves them untouched
    pub tags: Vec<String>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl_ms: u64) -> Self {
        self.ttl = Some(ttl_ms);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

type WarmUpFactory = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<Value>> + Send>;

// == Warm-Up Entry ==
/// A key to pre-populate, with the factory that computes its value.
pub struct WarmUpEntry {
    pub key: String,
    pub options: SetOptions,
    factory: WarmUpFactory,
}

impl WarmUpEntry {
    pub fn new<T, F, Fut>(key: impl Into<String>, factory: F, options: SetOptions) -> Self
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            key: key.into(),
            options,
            factory: Box::new(move || -> BoxFuture<'static, anyhow::Result<Value>> {
                Box::pin(async move {
                    let value = factory().await?;
                    Ok(serde_json::to_value(value)?)
                })
            }),
        }
    }
}

impl std::fmt::Debug for WarmUpEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmUpEntry")
            .field("key", &self.key)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

struct CacheInner {
    backend: Arc<dyn CacheBackend>,
    tags: Mutex<TagIndex>,
    default_ttl: u64,
}

// == Cache ==
/// Cloneable handle to one cache instance.
///
/// The cache is advisory: backend failures are logged and degrade to
/// "absent", `false` or a no-op, never to an error for the caller. Only
/// factory failures in [`Cache::get_or_set`] propagate.
///
/// Operations on the same key are not serialized; the last write wins.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<CacheInner>,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("backend", &self.inner.backend.name())
            .field("default_ttl", &self.inner.default_ttl)
            .finish()
    }
}

impl Cache {
    // == Constructors ==
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: u64) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                backend,
                tags: Mutex::new(TagIndex::new()),
                default_ttl,
            }),
        }
    }

    /// A cache over a fresh [`MemoryBackend`].
    pub fn in_memory(max_size: usize, default_ttl: u64) -> Self {
        Self::new(Arc::new(MemoryBackend::new(max_size)), default_ttl)
    }

    /// Builds the backend selected by `config`.
    ///
    /// `remote` is the store to wrap when `CACHE_TYPE=remote`; selecting the
    /// remote backend without one is a configuration error.
    pub fn from_config(config: &Config, remote: Option<Arc<dyn RemoteStore>>) -> Result<Self> {
        let backend: Arc<dyn CacheBackend> = match config.cache_type {
            CacheType::Memory => Arc::new(MemoryBackend::new(config.max_size)),
            CacheType::Remote => {
                let store = remote.ok_or_else(|| {
                    CacheError::Config("remote cache selected but no remote store supplied".into())
                })?;
                Arc::new(RemoteBackend::new(store, config.key_prefix.clone()))
            }
        };
        Ok(Self::new(backend, config.default_ttl))
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.backend.name()
    }

    pub fn default_ttl(&self) -> u64 {
        self.inner.default_ttl
    }

    // == Lifecycle ==
    pub async fn init(&self) -> Result<()> {
        self.inner.backend.init().await?;
        info!(backend = self.backend_name(), "Cache initialized");
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.inner.backend.shutdown().await?;
        info!(backend = self.backend_name(), "Cache shut down");
        Ok(())
    }

    // == Get ==
    /// Returns the cached value, or `None` on a miss, a backend failure or a
    /// value that does not decode as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key).await?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(err) => {
                warn!(key, error = %err, "Cached value has unexpected shape");
                None
            }
        }
    }

    /// Untyped [`Cache::get`].
    pub async fn get_value(&self, key: &str) -> Option<Value> {
        let seen = self.generation(key);
        match self.inner.backend.get(key).await {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                self.reconcile(key, seen);
                None
            }
            Err(err) => {
                warn!(key, error = %err, "Cache get failed");
                None
            }
        }
    }

    // == Set ==
    /// Stores `value`, then replaces the key's tags when `options.tags` is
    /// non-empty. Returns false if the value could not be stored.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, options: SetOptions) -> bool {
        match serde_json::to_value(value) {
            Ok(value) => self.set_value(key, value, options).await,
            Err(err) => {
                warn!(key, error = %err, "Cache value not serializable");
                false
            }
        }
    }

    /// Untyped [`Cache::set`].
    pub async fn set_value(&self, key: &str, value: Value, options: SetOptions) -> bool {
        let ttl = options.ttl.unwrap_or(self.inner.default_ttl);
        if let Err(err) = self.inner.backend.set(key, value, ttl).await {
            warn!(key, error = %err, "Cache set failed");
            return false;
        }

        {
            let mut index = self.inner.tags.lock();
            if options.tags.is_empty() {
                index.touch(key);
            } else {
                index.set_tags(key, options.tags);
            }
        }
        true
    }

    // == Delete ==
    /// Removes `key` and its tag memberships. True iff the backend held it.
    pub async fn delete(&self, key: &str) -> bool {
        let seen = self.generation(key);
        match self.inner.backend.delete(key).await {
            Ok(removed) => {
                // Clean up even if the backend had already evicted the key
                self.inner.tags.lock().remove_tags_if(key, seen);
                removed
            }
            Err(err) => {
                warn!(key, error = %err, "Cache delete failed");
                false
            }
        }
    }

    pub async fn has(&self, key: &str) -> bool {
        let seen = self.generation(key);
        match self.inner.backend.has(key).await {
            Ok(true) => true,
            Ok(false) => {
                self.reconcile(key, seen);
                false
            }
            Err(err) => {
                warn!(key, error = %err, "Cache has failed");
                false
            }
        }
    }

    pub async fn clear(&self) {
        match self.inner.backend.clear().await {
            Ok(()) => self.inner.tags.lock().clear(),
            Err(err) => warn!(error = %err, "Cache clear failed"),
        }
    }

    pub async fn keys(&self) -> Vec<String> {
        self.inner.backend.keys().await.unwrap_or_else(|err| {
            warn!(error = %err, "Cache keys failed");
            Vec::new()
        })
    }

    pub async fn size(&self) -> usize {
        self.inner.backend.size().await.unwrap_or_else(|err| {
            warn!(error = %err, "Cache size failed");
            0
        })
    }

    /// Backend counters, if the backend keeps them.
    pub async fn stats(&self) -> Option<CacheStats> {
        self.inner.backend.stats().await
    }

    // == Get Or Set ==
    /// Cache-aside: returns the cached value, or computes it with `factory`,
    /// stores it and returns it.
    ///
    /// Factory errors propagate to the caller. Concurrent misses on the same
    /// key are not coalesced: each caller runs `factory` and writes its own
    /// result, and the last write wins.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        factory: F,
        options: SetOptions,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }

        let value = factory().await?;
        self.set(key, &value, options).await;
        Ok(value)
    }

    // == Batch ==
    /// Concurrent [`Cache::get`] for each key, results in input order.
    pub async fn mget<T, K>(&self, keys: &[K]) -> Vec<Option<T>>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        join_all(keys.iter().map(|key| self.get::<T>(key.as_ref()))).await
    }

    /// Concurrent [`Cache::set`] for each entry. Individual failures do not
    /// abort the batch. Returns the number stored.
    pub async fn mset<T, K>(&self, entries: Vec<(K, T, SetOptions)>) -> usize
    where
        T: Serialize,
        K: AsRef<str>,
    {
        join_all(
            entries
                .iter()
                .map(|(key, value, options)| self.set(key.as_ref(), value, options.clone())),
        )
        .await
        .into_iter()
        .filter(|stored| *stored)
        .count()
    }

    // == Warm Up ==
    /// Computes and stores every entry concurrently. A failing factory is
    /// logged and skipped. Returns the number stored.
    pub async fn warm_up(&self, entries: Vec<WarmUpEntry>) -> usize {
        let total = entries.len();
        let tasks = entries.into_iter().map(|entry| async move {
            let WarmUpEntry {
                key,
                options,
                factory,
            } = entry;
            match factory().await {
                Ok(value) => self.set_value(&key, value, options).await,
                Err(err) => {
                    warn!(key = %key, error = %err, "Cache warm-up factory failed");
                    false
                }
            }
        });

        let stored = join_all(tasks).await.into_iter().filter(|ok| *ok).count();
        info!(stored, total, "Cache warm-up complete");
        stored
    }

    // == Tag Invalidation ==
    /// Deletes every key tagged `tag`. Returns how many were actually present.
    pub async fn invalidate_by_tag(&self, tag: &str) -> usize {
        self.invalidate_by_tags(&[tag]).await
    }

    /// Deletes every key carrying any of `tags`, each key once.
    pub async fn invalidate_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> usize {
        let mut keys: Vec<String> = {
            let index = self.inner.tags.lock();
            tags.iter()
                .flat_map(|tag| index.keys_for_tag(tag.as_ref()))
                .collect()
        };
        keys.sort();
        keys.dedup();

        let deleted = join_all(keys.iter().map(|key| self.delete(key)))
            .await
            .into_iter()
            .filter(|removed| *removed)
            .count();

        debug!(tags = tags.len(), deleted, "Invalidated tagged keys");
        deleted
    }

    // == Tag Reconciliation ==
    /// Drops tag memberships of keys the backend no longer holds, e.g. after
    /// an LRU eviction or TTL expiry. Returns the number of keys reconciled.
    ///
    /// A key written while its presence check is in flight keeps its tags.
    pub async fn prune_tags(&self) -> usize {
        let tagged = self.inner.tags.lock().tagged_keys();
        let mut pruned = 0;
        for key in tagged {
            let seen = self.generation(&key);
            if let Ok(false) = self.inner.backend.has(&key).await {
                if self.inner.tags.lock().remove_tags_if(&key, seen) {
                    pruned += 1;
                }
            }
        }
        pruned
    }

    pub fn tags_for(&self, key: &str) -> Vec<String> {
        self.inner.tags.lock().tags_for_key(key)
    }

    pub fn keys_for_tag(&self, tag: &str) -> Vec<String> {
        self.inner.tags.lock().keys_for_tag(tag)
    }

    pub fn tag_count(&self) -> usize {
        self.inner.tags.lock().tag_count()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.inner.tags.lock().contains_tag(tag)
    }

    fn generation(&self, key: &str) -> Option<u64> {
        self.inner.tags.lock().generation(key)
    }

    /// Drops the tags of a key the backend reported missing, unless the key
    /// was written after `seen` was taken.
    fn reconcile(&self, key: &str, seen: Option<u64>) {
        if self.inner.tags.lock().remove_tags_if(key, seen) {
            debug!(key, "Dropped tags of vanished key");
        }
    }
}
