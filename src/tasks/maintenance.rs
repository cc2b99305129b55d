//! Cache Maintenance Task
//!
//! Background task that eagerly sweeps expired entries and drops tag
//! memberships of keys the backend has evicted or expired on its own.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Cache;

/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Live entries after the sweep
    pub live_entries: usize,
    /// Keys whose stale tag memberships were dropped
    pub pruned_tags: usize,
}

/// Runs a single maintenance pass.
///
/// `size()` makes every backend prune expired entries before counting, so
/// it doubles as the eager sweep.
pub async fn run_maintenance(cache: &Cache) -> MaintenanceReport {
    let live_entries = cache.size().await;
    let pruned_tags = cache.prune_tags().await;
    MaintenanceReport {
        live_entries,
        pruned_tags,
    }
}

/// Spawns a task that runs [`run_maintenance`] every `interval_ms`
/// milliseconds until aborted.
///
/// # Example
/// ```ignore
/// let handle = spawn_maintenance_task(cache.clone(), 60_000);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_maintenance_task(cache: Cache, interval_ms: u64) -> JoinHandle<()> {
    let interval = Duration::from_millis(interval_ms.max(1));

    tokio::spawn(async move {
        info!(interval_ms, "Starting cache maintenance task");

        loop {
            tokio::time::sleep(interval).await;

            let report = run_maintenance(&cache).await;

            if report.pruned_tags > 0 {
                info!(
                    live_entries = report.live_entries,
                    pruned_tags = report.pruned_tags,
                    "Cache maintenance: reconciled tag index"
                );
            } else {
                debug!(live_entries = report.live_entries, "Cache maintenance: nothing to reconcile");
            }
        }
    })
}
