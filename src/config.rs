//! Configuration Module
//!
//! Loads cache and server configuration from environment variables.

use std::env;
use std::str::FromStr;

use tracing::warn;

/// Which backend the cache stores entries in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheType {
    /// Process-local LRU map
    #[default]
    Memory,
    /// Any key-value store wrapped by `RemoteBackend`
    Remote,
}

impl FromStr for CacheType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheType::Memory),
            "remote" | "redis" => Ok(CacheType::Remote),
            other => Err(format!("unknown cache type '{}'", other)),
        }
    }
}

/// Cache and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Selected backend
    pub cache_type: CacheType,
    /// Default TTL in milliseconds for entries without explicit TTL (0 = never expires)
    pub default_ttl: u64,
    /// Maximum number of entries the in-memory backend can hold
    pub max_size: usize,
    /// Namespace prefix applied to keys in a remote store
    pub key_prefix: String,
    /// Interval in milliseconds between maintenance sweeps
    pub sweep_interval: u64,
    /// HTTP admin server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TYPE` - `memory` or `remote` (default: memory)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in milliseconds (default: 0)
    /// - `CACHE_MAX_SIZE` - Maximum in-memory entries (default: 1000)
    /// - `CACHE_KEY_PREFIX` - Remote key namespace (default: `cache:`)
    /// - `CACHE_SWEEP_INTERVAL` - Maintenance interval in milliseconds (default: 60000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cache_type = match env::var("CACHE_TYPE") {
            Ok(raw) => raw.parse().unwrap_or_else(|err| {
                warn!(error = %err, "Falling back to memory cache backend");
                CacheType::Memory
            }),
            Err(_) => defaults.cache_type,
        };

        Self {
            cache_type,
            default_ttl: parse_var("CACHE_DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            max_size: parse_var("CACHE_MAX_SIZE").unwrap_or(defaults.max_size),
            key_prefix: env::var("CACHE_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            sweep_interval: parse_var("CACHE_SWEEP_INTERVAL").unwrap_or(defaults.sweep_interval),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_type: CacheType::Memory,
            default_ttl: 0,
            max_size: 1000,
            key_prefix: "cache:".to_string(),
            sweep_interval: 60_000,
            server_port: 3000,
        }
    }
}
