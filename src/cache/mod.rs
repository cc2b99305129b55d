//! Cache Module
//!
//! Tagged, TTL-aware caching over pluggable backends.
//!
//! Layers, leaves first: entry and backend contract, the in-memory and
//! remote backends, then the [`Cache`] orchestrator that owns the tag index.

mod backend;
mod entry;
mod memory;
mod orchestrator;
mod recency;
mod remote;
mod stats;
mod tags;


// Re-export public types
pub use backend::CacheBackend;
pub use entry::{current_timestamp_ms, CacheEntry};
pub use memory::{MemoryBackend, MemoryStore};
pub use orchestrator::{Cache, SetOptions, WarmUpEntry};
pub use recency::RecencyIndex;
pub use remote::{RemoteBackend, RemoteStore};
pub use stats::CacheStats;
pub use tags::TagIndex;

// == Public Constants ==
/// Maximum allowed key length in bytes for the admin API
pub const MAX_KEY_LENGTH: usize = 256;
