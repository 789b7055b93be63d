//! Connectivity Tasks
//!
//! Wire host connectivity reports into the monitor, and monitor
//! transitions into queue drains.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::connectivity::{ConnectivityMonitor, ConnectivitySignal};
use crate::queue::SyncQueue;

/// Spawns a task that drains the queue on every offline-to-online
/// transition. Going offline has no queue side effect.
pub fn spawn_connectivity_task(
    queue: Arc<SyncQueue>,
    connectivity: ConnectivityMonitor,
) -> JoinHandle<()> {
    let mut changes = connectivity.subscribe();

    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let online = changes.borrow_and_update().is_online();
            if online {
                info!(
                    "Back online with {} queued operations; draining",
                    queue.size().await
                );
                queue.drain().await;
            }
        }
    })
}

/// Spawns a task that forwards every report of `signal` to the monitor
/// until the signal closes.
pub fn spawn_signal_task<S>(mut signal: S, connectivity: ConnectivityMonitor) -> JoinHandle<()>
where
    S: ConnectivitySignal + 'static,
{
    tokio::spawn(async move {
        while let Some(quality) = signal.next().await {
            connectivity.update(quality);
        }
        warn!("Connectivity signal closed; state frozen at {}", connectivity.quality());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::connectivity::{ChannelSignal, ConnectionQuality};
    use crate::persistence::MemoryStore;
    use crate::queue::{Method, NewOperation, QueueSettings, SyncOperation};
    use crate::transport::{Transport, TransportError};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn execute(&self, _operation: &SyncOperation) -> Result<(), TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn fetch(&self, _key: &str) -> Result<Value, TransportError> {
            Ok(Value::Null)
        }
    }

    fn queue(transport: Arc<CountingTransport>, monitor: &ConnectivityMonitor) -> Arc<SyncQueue> {
        Arc::new(SyncQueue::new(
            QueueSettings::default(),
            transport,
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            monitor.clone(),
            None,
        ))
    }

    #[tokio::test]
    async fn test_online_transition_drains() {
        let transport = Arc::new(CountingTransport::default());
        let monitor = ConnectivityMonitor::new(false);
        let queue = queue(transport.clone(), &monitor);
        queue.enqueue(NewOperation::new(Method::Post, "/a")).await;
        queue.enqueue(NewOperation::new(Method::Post, "/b")).await;

        let handle = spawn_connectivity_task(queue.clone(), monitor.clone());
        monitor.set_online(true);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert_eq!(queue.size().await, 0);
        handle.abort();
    }

    #[tokio::test]
    async fn test_offline_transition_does_not_drain() {
        let transport = Arc::new(CountingTransport::default());
        let monitor = ConnectivityMonitor::new(true);
        let queue = queue(transport.clone(), &monitor);

        let handle = spawn_connectivity_task(queue.clone(), monitor.clone());
        monitor.set_online(false);
        queue.enqueue(NewOperation::new(Method::Post, "/a")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(queue.size().await, 1);
        handle.abort();
    }

    #[tokio::test]
    async fn test_signal_task_feeds_monitor() {
        let monitor = ConnectivityMonitor::new(false);
        let (signal, handle) = ChannelSignal::new();
        let task = spawn_signal_task(signal, monitor.clone());

        handle.report(ConnectionQuality::Poor);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(monitor.is_online());
        assert_eq!(monitor.quality(), ConnectionQuality::Poor);

        drop(handle);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(task.is_finished());
    }
}
