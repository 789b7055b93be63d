//! Drain Task
//!
//! Background task that drains the sync queue on a fixed cadence and
//! whenever an online enqueue asks for it. This cadence is also what paces
//! retries of failed operations.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::connectivity::ConnectivityMonitor;
use crate::queue::SyncQueue;

/// Spawns the periodic drain task.
///
/// Drains once right away, then on every wake-up, each time only if the
/// monitor reports online. Overlap with
/// the connectivity task is harmless: the queue skips a drain that starts
/// while another is running.
///
/// # Returns
/// A JoinHandle for the spawned task, used to abort it on shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_drain_task(queue.clone(), monitor.clone(), Duration::from_secs(30));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_drain_task(
    queue: Arc<SyncQueue>,
    connectivity: ConnectivityMonitor,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting drain task with interval of {:?}", interval);

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately, so a queue restored while
        // already online is drained at startup
        loop {
            tokio::select! {
                _ = ticker.tick() => debug!("Drain tick"),
                _ = queue.drain_requested() => debug!("Drain requested"),
            }

            if connectivity.is_online() {
                queue.drain().await;
            }
        }
    })
}
