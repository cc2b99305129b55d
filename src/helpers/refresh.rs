//! Refresh-ahead and delayed invalidation.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{current_timestamp_ms, Cache, SetOptions};

/// What [`cache_with_refresh`] stores: the value plus when it was computed.
#[derive(Debug, Serialize, Deserialize)]
struct Stamped<T> {
    data: T,
    timestamp: u64,
}

/// Stale-while-revalidate.
///
/// On a hit the cached value is returned at once; if it is older than
/// `ttl * refresh_threshold` milliseconds, `factory` is also run on a
/// background task to repopulate the key before the hard `ttl` expires. On a
/// miss the value is computed inline, stored and returned, and a factory
/// error is returned to the caller.
///
/// Background refreshes cannot be cancelled and their failures are only
/// logged; the stale value stays until its own TTL runs out. They are not
/// de-duplicated either: every hit on an aging entry spawns its own refresh,
/// so a hot key inside the refresh window runs `factory` once per request
/// until a refresh lands. With `ttl == 0` the entry never expires and is
/// never refreshed ahead.
pub async fn cache_with_refresh<T, E, F, Fut>(
    cache: &Cache,
    key: &str,
    factory: F,
    ttl: u64,
    refresh_threshold: f64,
    options: SetOptions,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    E: Display + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let options = options.ttl(ttl);

    if let Some(cached) = cache.get::<Stamped<T>>(key).await {
        let age = current_timestamp_ms().saturating_sub(cached.timestamp);
        if ttl > 0 && age as f64 > ttl as f64 * refresh_threshold {
            debug!(key, age, "Refreshing cache entry ahead of expiry");
            spawn_refresh(cache.clone(), key.to_string(), factory, options);
        }
        return Ok(cached.data);
    }

    let data = factory().await?;
    store_stamped(cache, key, &data, options).await;
    Ok(data)
}

fn spawn_refresh<T, E, F, Fut>(cache: Cache, key: String, factory: F, options: SetOptions)
where
    T: Serialize + Send + Sync + 'static,
    E: Display + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    tokio::spawn(async move {
        match factory().await {
            Ok(data) => {
                store_stamped(&cache, &key, &data, options).await;
                debug!(key = %key, "Background cache refresh complete");
            }
            Err(err) => warn!(key = %key, error = %err, "Background cache refresh failed"),
        }
    });
}

async fn store_stamped<T: Serialize + Sync>(cache: &Cache, key: &str, data: &T, options: SetOptions) {
    let stamped = Stamped {
        data,
        timestamp: current_timestamp_ms(),
    };
    cache.set(key, &stamped, options).await;
}

/// Cache-aside with a fixed lifetime independent of the backend TTL.
///
/// Behaves like [`Cache::get_or_set`], then schedules an unconditional
/// delete of `key` after `invalidate_after` milliseconds.
pub async fn cache_with_invalidation<T, E, F, Fut>(
    cache: &Cache,
    key: &str,
    factory: F,
    invalidate_after: u64,
    options: SetOptions,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let value = cache.get_or_set(key, factory, options).await?;

    let cache = cache.clone();
    let key = key.to_string();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(invalidate_after)).await;
        if cache.delete(&key).await {
            debug!(key = %key, "Scheduled invalidation removed key");
        }
    });

    Ok(value)
}
