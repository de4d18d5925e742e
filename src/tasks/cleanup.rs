//! TTL Cleanup Task
//!
//! Background task that periodically purges expired cache entries, so stale
//! documents stop counting toward their partition's bound even when nobody
//! reads them.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::sync::SyncCoordinator;

/// Spawns a background task that purges expired entries every
/// `cleanup_interval_secs` seconds.
///
/// # Returns
/// A JoinHandle for the spawned task, aborted during graceful shutdown.
pub fn spawn_cleanup_task(coordinator: SyncCoordinator, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting TTL cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = coordinator.purge_expired().await;

            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}
