//! Helpers Module
//!
//! Stateless policies built on top of [`Cache`](crate::cache::Cache):
//! deterministic key derivation, refresh-ahead, delayed invalidation and
//! function memoization.

mod keys;
mod memoize;
mod refresh;

pub use keys::generate_key;
pub use memoize::with_cache;
pub use refresh::{cache_with_invalidation, cache_with_refresh};
