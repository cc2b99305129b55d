//! Integration Tests for the Cache Library
//!
//! Drives the public API the way application code does.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tagcache::cache::{current_timestamp_ms, RemoteStore};
use tagcache::config::{CacheType, Config};
use tagcache::helpers::{cache_with_refresh, generate_key, with_cache};
use tagcache::{Cache, CacheError, SetOptions, WarmUpEntry};

// == Helpers ==

/// In-process stand-in for a remote key-value store.
#[derive(Default)]
struct MapStore {
    data: Mutex<HashMap<String, (String, Option<u64>)>>,
}

#[async_trait]
impl RemoteStore for MapStore {
    async fn get(&self, key: &str) -> tagcache::Result<Option<String>> {
        let now = current_timestamp_ms();
        Ok(self
            .data
            .lock()
            .get(key)
            .filter(|(_, deadline)| deadline.map_or(true, |d| d >= now))
            .map(|(v, _)| v.clone()))
    }

    async fn set_ex(&self, key: &str, value: String, expiry_ms: Option<u64>) -> tagcache::Result<()> {
        let deadline = expiry_ms.map(|ms| current_timestamp_ms() + ms);
        self.data.lock().insert(key.to_string(), (value, deadline));
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> tagcache::Result<u64> {
        let mut data = self.data.lock();
        Ok(keys.iter().filter(|k| data.remove(*k).is_some()).count() as u64)
    }

    async fn keys(&self, pattern: &str) -> tagcache::Result<Vec<String>> {
        let prefix = pattern.trim_end_matches('*');
        Ok(self
            .data
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn exists(&self, key: &str) -> tagcache::Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn flush(&self) -> tagcache::Result<()> {
        self.data.lock().clear();
        Ok(())
    }
}

// == TTL ==

#[tokio::test]
async fn test_ttl_then_absent() {
    let cache = Cache::in_memory(100, 0);
    cache.set("k", &"v", SetOptions::new().ttl(50)).await;
    assert_eq!(cache.get::<String>("k").await.as_deref(), Some("v"));

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(cache.get::<String>("k").await, None);
}

#[tokio::test]
async fn test_zero_ttl_survives() {
    let cache = Cache::in_memory(100, 0);
    cache.set("k", &"v", SetOptions::new().ttl(0)).await;

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(cache.get::<String>("k").await.as_deref(), Some("v"));
}

// == Eviction ==

#[tokio::test]
async fn test_bounded_eviction_drops_least_recent() {
    let max_size = 5;
    let cache = Cache::in_memory(max_size, 0);
    for i in 0..=max_size {
        cache.set(&format!("k{}", i), &i, SetOptions::new()).await;
    }

    assert_eq!(cache.size().await, max_size);
    assert!(!cache.has("k0").await);
    assert!(cache.has(&format!("k{}", max_size)).await);
}

#[tokio::test]
async fn test_touched_key_survives_eviction() {
    let cache = Cache::in_memory(3, 0);
    for key in ["a", "b", "c"] {
        cache.set(key, &key, SetOptions::new()).await;
    }

    cache.get::<String>("a").await;
    cache.set("d", &"d", SetOptions::new()).await;

    assert!(cache.has("a").await);
    assert!(!cache.has("b").await);
}

// == Tags ==

#[tokio::test]
async fn test_tag_invalidation_and_index_cleanup() {
    let cache = Cache::in_memory(100, 0);
    cache.set("a", &1, SetOptions::new().tags(["t"])).await;
    cache.set("b", &2, SetOptions::new().tags(["t"])).await;
    cache.set("c", &3, SetOptions::new().tags(["u"])).await;

    assert_eq!(cache.invalidate_by_tag("t").await, 2);

    assert!(!cache.has("a").await);
    assert!(!cache.has("b").await);
    assert!(cache.has("c").await);
    assert!(!cache.has_tag("t"));
    assert!(cache.keys_for_tag("t").is_empty());
}

// == Cache-aside ==

#[tokio::test]
async fn test_get_or_set_runs_factory_once() {
    let cache = Cache::in_memory(100, 0);
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        let value: Result<u32, CacheError> = cache
            .get_or_set(
                "answer",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                },
                SetOptions::new(),
            )
            .await;
        assert_eq!(value.unwrap(), 42);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// Concurrent misses are not coalesced: each caller may run the factory.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_all_resolve() {
    let cache = Cache::in_memory(100, 0);
    let calls = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                cache
                    .get_or_set(
                        "shared",
                        || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok::<_, CacheError>("value".to_string())
                        },
                        SetOptions::new(),
                    )
                    .await
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), "value");
    }

    let runs = calls.load(Ordering::SeqCst);
    assert!((1..=8).contains(&runs));
    assert_eq!(cache.get::<String>("shared").await.as_deref(), Some("value"));
}

// == Stats ==

#[tokio::test]
async fn test_hit_rate_arithmetic() {
    let cache = Cache::in_memory(100, 0);
    assert_eq!(cache.stats().await.unwrap().hit_rate(), 0.0);

    cache.set("k", &1, SetOptions::new()).await;
    for _ in 0..3 {
        cache.get::<i32>("k").await;
    }
    for _ in 0..2 {
        cache.get::<i32>("missing").await;
    }

    let stats = cache.stats().await.unwrap();
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.misses, 2);
    assert!((stats.hit_rate() - 0.6).abs() < 1e-9);
}

// == Keys ==

#[test]
fn test_key_determinism() {
    assert_eq!(
        generate_key("p", &json!({"a": 1, "b": 2})).unwrap(),
        generate_key("p", &json!({"b": 2, "a": 1})).unwrap()
    );
}

// == Warm-up ==

#[tokio::test]
async fn test_warm_up_partial_failure() {
    let cache = Cache::in_memory(100, 0);

    let stored = cache
        .warm_up(vec![
            WarmUpEntry::new("x", || async { Ok("ok") }, SetOptions::new().tags(["boot"])),
            WarmUpEntry::new(
                "y",
                || async { Err::<&str, _>(anyhow::anyhow!("throws")) },
                SetOptions::new(),
            ),
        ])
        .await;

    assert_eq!(stored, 1);
    assert!(cache.has("x").await);
    assert!(!cache.has("y").await);
    assert_eq!(cache.keys_for_tag("boot"), vec!["x".to_string()]);
}

// == Remote backend ==

#[tokio::test]
async fn test_remote_backend_from_config() {
    let store = Arc::new(MapStore::default());
    let config = Config {
        cache_type: CacheType::Remote,
        key_prefix: "app:".to_string(),
        ..Config::default()
    };
    let remote: Arc<dyn RemoteStore> = store.clone();
    let cache = Cache::from_config(&config, Some(remote)).unwrap();
    cache.init().await.unwrap();
    assert_eq!(cache.backend_name(), "remote");

    cache
        .set("user:1", &json!({"name": "Ada"}), SetOptions::new().tags(["users"]))
        .await;
    cache.set("user:2", &json!({"name": "Bob"}), SetOptions::new().tags(["users"])).await;

    assert!(store.data.lock().contains_key("app:user:1"));
    assert_eq!(cache.size().await, 2);
    assert!(cache.stats().await.is_none());

    assert_eq!(cache.invalidate_by_tag("users").await, 2);
    assert_eq!(cache.size().await, 0);

    cache.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_remote_ttl_expiry() {
    let config = Config {
        cache_type: CacheType::Remote,
        default_ttl: 40,
        ..Config::default()
    };
    let remote: Arc<dyn RemoteStore> = Arc::new(MapStore::default());
    let cache = Cache::from_config(&config, Some(remote)).unwrap();
    cache.set("k", &1, SetOptions::new()).await;
    assert!(cache.has("k").await);

    tokio::time::sleep(Duration::from_millis(120)).await;

    assert!(!cache.has("k").await);
}

// == Helpers composed ==

#[tokio::test]
async fn test_memoized_lookup_invalidated_by_tag() {
    let cache = Cache::in_memory(100, 0);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let profile = with_cache(
        cache.clone(),
        move |id: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, CacheError>(format!("profile-{}", id)) }
        },
        |id| format!("profile:{}", id),
        SetOptions::new().tags(["profiles"]),
    );

    assert_eq!(profile(1).await.unwrap(), "profile-1");
    assert_eq!(profile(1).await.unwrap(), "profile-1");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    cache.invalidate_by_tag("profiles").await;
    assert_eq!(profile(1).await.unwrap(), "profile-1");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_refresh_ahead_serves_then_updates() {
    let cache = Cache::in_memory(100, 0);
    let version = Arc::new(AtomicUsize::new(0));

    let next = {
        let version = version.clone();
        move || {
            let v = version.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok::<_, CacheError>(v) }
        }
    };

    assert_eq!(
        cache_with_refresh(&cache, "feed", next.clone(), 1_000, 0.05, SetOptions::new())
            .await
            .unwrap(),
        1
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        cache_with_refresh(&cache, "feed", next.clone(), 1_000, 0.05, SetOptions::new())
            .await
            .unwrap(),
        1
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        cache_with_refresh(&cache, "feed", next, 1_000, 1.0, SetOptions::new())
            .await
            .unwrap(),
        2
    );
}
