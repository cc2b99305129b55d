//! Tagcache - A tagged, TTL-aware cache
//!
//! Pluggable backends with expiry and LRU eviction, tag-based bulk
//! invalidation, cache-aside and batch helpers, and refresh-ahead policies.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod helpers;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, CacheBackend, SetOptions, WarmUpEntry};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_maintenance_task;
