//! Tagcache - A tagged, TTL-aware cache
//!
//! Composition root: builds one cache from the environment and serves the
//! admin API over it.

use std::net::SocketAddr;

use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tagcache::api::{create_router, AppState};
use tagcache::cache::Cache;
use tagcache::config::Config;
use tagcache::spawn_maintenance_task;

/// Main entry point.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build and initialize the cache
/// 4. Start the background maintenance task
/// 5. Serve the admin router until SIGINT/SIGTERM
/// 6. Stop the task and shut the cache down
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagcache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tagcache");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_type={:?}, default_ttl={}ms, max_size={}, port={}, sweep_interval={}ms",
        config.cache_type, config.default_ttl, config.max_size, config.server_port, config.sweep_interval
    );

    let cache = build_cache(&config);
    if let Err(err) = cache.init().await {
        warn!(error = %err, "Cache backend failed to initialize; continuing degraded");
    }

    let maintenance_handle = spawn_maintenance_task(cache.clone(), config.sweep_interval);
    info!("Background maintenance task started");

    let app = create_router(AppState::new(cache.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    maintenance_handle.abort();
    warn!("Maintenance task aborted");

    if let Err(err) = cache.shutdown().await {
        error!(error = %err, "Cache shutdown failed");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// No remote client is linked into this binary, so `CACHE_TYPE=remote`
/// degrades to the in-memory backend.
fn build_cache(config: &Config) -> Cache {
    match Cache::from_config(config, None) {
        Ok(cache) => cache,
        Err(err) => {
            warn!(error = %err, "Falling back to in-memory cache");
            Cache::in_memory(config.max_size, config.default_ttl)
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
