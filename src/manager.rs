//! Offline Manager
//!
//! Owns the cache, the sync queue and the connectivity monitor, and runs
//! the background tasks that tie them together.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::{CacheOptions, CacheStore, Priority};
use crate::clock::{self, Clock, SystemClock};
use crate::config::Config;
use crate::connectivity::{ConnectionQuality, ConnectivityMonitor, ConnectivitySignal};
use crate::persistence::DurableStore;
use crate::queue::{ExhaustedOperation, SyncQueue};
use crate::tasks::{spawn_connectivity_task, spawn_drain_task, spawn_signal_task};
use crate::transport::{Transport, TransportError};

// == Collaborators ==
/// External dependencies injected into the manager.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn DurableStore>,
    pub transport: Arc<dyn Transport>,
    pub clock: Arc<dyn Clock>,
    /// Receives operations dropped after their last failed attempt
    pub exhausted: Option<mpsc::UnboundedSender<ExhaustedOperation>>,
}

impl Collaborators {
    pub fn new(store: Arc<dyn DurableStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            store,
            transport,
            clock: Arc::new(SystemClock),
            exhausted: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_exhausted_sender(mut self, tx: mpsc::UnboundedSender<ExhaustedOperation>) -> Self {
        self.exhausted = Some(tx);
        self
    }
}

// == Reports ==
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ManagerStatus {
    pub is_online: bool,
    pub quality: ConnectionQuality,
    pub cache_entry_count: usize,
    pub cache_size_bytes: usize,
    pub cache_capacity_bytes: usize,
    pub queue_length: usize,
    pub draining: bool,
    pub last_drain_at: Option<DateTime<Utc>>,
}

/// Outcome of [`OfflineManager::prefetch`].
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PrefetchReport {
    pub fetched: Vec<String>,
    pub failed: Vec<String>,
    /// Nothing was fetched because the agent was offline
    pub skipped_offline: bool,
}

// == Offline Manager ==
pub struct OfflineManager {
    cache: Arc<RwLock<CacheStore>>,
    queue: Arc<SyncQueue>,
    connectivity: ConnectivityMonitor,
    transport: Arc<dyn Transport>,
    drain_interval: Duration,
    fetch_timeout: Duration,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl OfflineManager {
    /// Builds the cache and queue and restores both from the durable store.
    pub async fn open(config: &Config, collaborators: Collaborators, initially_online: bool) -> Self {
        let Collaborators {
            store,
            transport,
            clock,
            exhausted,
        } = collaborators;

        let connectivity = ConnectivityMonitor::new(initially_online);

        let mut cache = CacheStore::new(
            config.cache_capacity_bytes,
            Duration::from_secs(config.default_ttl),
            clock.clone(),
            store.clone(),
        );
        let cached = cache.load().await;

        let settings = config.queue_settings();
        let fetch_timeout = settings.execute_timeout;
        let queue = Arc::new(SyncQueue::new(
            settings,
            transport.clone(),
            store,
            clock,
            connectivity.clone(),
            exhausted,
        ));
        let queued = queue.load().await;

        info!(
            "Offline manager opened: {} cached entries, {} queued operations, {}",
            cached,
            queued,
            connectivity.quality()
        );

        Self {
            cache: Arc::new(RwLock::new(cache)),
            queue,
            connectivity,
            transport,
            drain_interval: Duration::from_secs(config.drain_interval),
            fetch_timeout,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Starts the drain timer and the reconnect reaction. If already online,
    /// anything restored from the last run is drained right away.
    pub fn start(&self) {
        let drain = spawn_drain_task(
            self.queue.clone(),
            self.connectivity.clone(),
            self.drain_interval,
        );
        let reconnect = spawn_connectivity_task(self.queue.clone(), self.connectivity.clone());
        self.track([drain, reconnect]);
    }

    /// Feeds `signal` into the connectivity monitor until it closes.
    pub fn attach_signal<S>(&self, signal: S)
    where
        S: ConnectivitySignal + 'static,
    {
        let pump = spawn_signal_task(signal, self.connectivity.clone());
        self.track([pump]);
    }

    fn track(&self, handles: impl IntoIterator<Item = JoinHandle<()>>) {
        match self.tasks.lock() {
            Ok(mut tasks) => tasks.extend(handles),
            Err(poisoned) => poisoned.into_inner().extend(handles),
        }
    }

    /// Aborts every background task. State already persisted stays on disk.
    pub fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        if !handles.is_empty() {
            info!("Stopping {} background tasks", handles.len());
        }
        for handle in handles {
            handle.abort();
        }
    }

    pub fn cache(&self) -> &Arc<RwLock<CacheStore>> {
        &self.cache
    }

    pub fn queue(&self) -> &Arc<SyncQueue> {
        &self.queue
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub async fn status(&self) -> ManagerStatus {
        let (cache_entry_count, cache_size_bytes, cache_capacity_bytes) = {
            let cache = self.cache.read().await;
            (cache.len(), cache.size_bytes(), cache.capacity_bytes())
        };

        ManagerStatus {
            is_online: self.connectivity.is_online(),
            quality: self.connectivity.quality(),
            cache_entry_count,
            cache_size_bytes,
            cache_capacity_bytes,
            queue_length: self.queue.size().await,
            draining: self.queue.is_draining(),
            last_drain_at: self.queue.last_drain_at().and_then(clock::to_datetime),
        }
    }

    /// Fetches each key from upstream and caches it as a critical entry
    /// with the default TTL. Failures are logged and reported per key.
    pub async fn prefetch(&self, keys: &[String]) -> PrefetchReport {
        if !self.connectivity.is_online() {
            info!("Offline, skipping prefetch of {} keys", keys.len());
            return PrefetchReport {
                skipped_offline: true,
                ..PrefetchReport::default()
            };
        }

        let mut report = PrefetchReport::default();
        for key in keys {
            let fetched = tokio::time::timeout(self.fetch_timeout, self.transport.fetch(key))
                .await
                .unwrap_or(Err(TransportError::Timeout));

            let value = match fetched {
                Ok(value) => value,
                Err(e) => {
                    warn!("Prefetch of '{}' failed: {}", key, e);
                    report.failed.push(key.clone());
                    continue;
                }
            };

            let stored = self
                .cache
                .write()
                .await
                .put(key, value, CacheOptions::with_priority(Priority::Critical))
                .await;
            match stored {
                Ok(_) => report.fetched.push(key.clone()),
                Err(e) => {
                    warn!("Prefetched '{}' could not be cached: {}", key, e);
                    report.failed.push(key.clone());
                }
            }
        }

        info!(
            "Prefetch complete: {} fetched, {} failed",
            report.fetched.len(),
            report.failed.len()
        );
        report
    }
}

impl Drop for OfflineManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for OfflineManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineManager")
            .field("connectivity", &self.connectivity.quality())
            .field("drain_interval", &self.drain_interval)
            .finish_non_exhaustive()
    }
}
