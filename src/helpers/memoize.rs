//! Function memoization through the cache.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{Cache, SetOptions};

/// Wraps an async function so each call goes through [`Cache::get_or_set`].
///
/// `key_fn` derives the cache key from the call's argument; pair it with
/// [`generate_key`](crate::helpers::generate_key) for structured arguments.
/// Errors from `f` are returned to the caller and nothing is cached.
///
/// ```ignore
/// let lookup = with_cache(
///     cache.clone(),
///     |id: u64| async move { repo.find_user(id).await },
///     |id| format!("user:{}", id),
///     SetOptions::new().ttl(60_000).tags(["users"]),
/// );
/// let user = lookup(42).await?;
/// ```
pub fn with_cache<A, T, E, F, Fut, K>(
    cache: Cache,
    f: F,
    key_fn: K,
    options: SetOptions,
) -> impl Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync + 'static
where
    A: Send + 'static,
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    E: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    K: Fn(&A) -> String + Send + Sync + 'static,
{
    let f = Arc::new(f);
    move |args: A| -> BoxFuture<'static, Result<T, E>> {
        let key = key_fn(&args);
        let cache = cache.clone();
        let f = Arc::clone(&f);
        let options = options.clone();
        Box::pin(async move { cache.get_or_set(&key, move || f(args), options).await })
    }
}
