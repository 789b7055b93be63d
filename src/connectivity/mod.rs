//! Connectivity Module
//!
//! Tracks whether the upstream is reachable and fans transitions out to
//! subscribers.
//!
//! # Components
//! - [`ConnectivityMonitor`]: current state plus change notification
//! - [`ConnectivitySignal`]: host-level event source feeding the monitor
//! - [`ChannelSignal`] / [`HealthProbe`]: the two bundled signal sources

mod probe;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

pub use probe::HealthProbe;

// == Connection Quality ==
/// Link state as reported by the host. Anything but `Offline` is online.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Good,
    Poor,
    Offline,
}

impl ConnectionQuality {
    pub fn is_online(self) -> bool {
        !matches!(self, ConnectionQuality::Offline)
    }

    pub fn from_online(online: bool) -> Self {
        if online {
            ConnectionQuality::Good
        } else {
            ConnectionQuality::Offline
        }
    }
}

impl fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionQuality::Good => "good",
            ConnectionQuality::Poor => "poor",
            ConnectionQuality::Offline => "offline",
        };
        f.write_str(name)
    }
}

// == Subscription ==
/// Handle returned by [`ConnectivityMonitor::on_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ChangeCallback = Arc<dyn Fn(bool) + Send + Sync>;

struct MonitorInner {
    state: watch::Sender<ConnectionQuality>,
    callbacks: Mutex<Vec<(SubscriptionId, ChangeCallback)>>,
    next_id: AtomicU64,
}

// == Connectivity Monitor ==
/// Shared online/offline state. Cheap to clone; all clones see the same state.
///
/// Receivers from [`ConnectivityMonitor::subscribe`] and callbacks from
/// [`ConnectivityMonitor::on_change`] fire only on online/offline
/// transitions. A quality change that stays online is recorded silently.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(ConnectionQuality::from_online(initially_online));
        Self {
            inner: Arc::new(MonitorInner {
                state,
                callbacks: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn is_online(&self) -> bool {
        self.quality().is_online()
    }

    pub fn quality(&self) -> ConnectionQuality {
        *self.inner.state.borrow()
    }

    pub fn set_online(&self, online: bool) -> bool {
        self.update(ConnectionQuality::from_online(online))
    }

    // == Update ==
    /// Records a new quality. Returns whether this was an online/offline
    /// transition.
    pub fn update(&self, quality: ConnectionQuality) -> bool {
        let mut transitioned = false;
        self.inner.state.send_if_modified(|current| {
            transitioned = current.is_online() != quality.is_online();
            *current = quality;
            transitioned
        });

        if !transitioned {
            debug!("Connectivity quality now {}", quality);
            return false;
        }

        let online = quality.is_online();
        info!(
            "Connectivity changed: {}",
            if online { "online" } else { "offline" }
        );

        let callbacks: Vec<ChangeCallback> = match self.inner.callbacks.lock() {
            Ok(list) => list.iter().map(|(_, cb)| cb.clone()).collect(),
            Err(_) => Vec::new(),
        };
        for callback in callbacks {
            callback(online);
        }
        true
    }

    /// Receiver that wakes on every online/offline transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionQuality> {
        self.inner.state.subscribe()
    }

    /// Registers a callback invoked with the new online flag on each transition.
    pub fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut list) = self.inner.callbacks.lock() {
            list.push((id, Arc::new(callback)));
        }
        id
    }

    /// Removes a callback. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.inner.callbacks.lock() {
            Ok(mut list) => {
                let before = list.len();
                list.retain(|(existing, _)| *existing != id);
                list.len() != before
            }
            Err(_) => false,
        }
    }
}

impl fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("quality", &self.quality())
            .finish()
    }
}

// == Connectivity Signal ==
/// Host-level source of connectivity reports.
#[async_trait]
pub trait ConnectivitySignal: Send {
    /// Waits for the next report. `None` means the source is closed.
    async fn next(&mut self) -> Option<ConnectionQuality>;
}

// == Channel Signal ==
/// Signal driven by the host pushing states through a [`SignalHandle`].
#[derive(Debug)]
pub struct ChannelSignal {
    rx: mpsc::UnboundedReceiver<ConnectionQuality>,
}

/// Sending half of a [`ChannelSignal`].
#[derive(Debug, Clone)]
pub struct SignalHandle {
    tx: mpsc::UnboundedSender<ConnectionQuality>,
}

impl ChannelSignal {
    pub fn new() -> (Self, SignalHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, SignalHandle { tx })
    }
}

impl SignalHandle {
    /// Returns false once the signal side is gone.
    pub fn report(&self, quality: ConnectionQuality) -> bool {
        self.tx.send(quality).is_ok()
    }

    pub fn set_online(&self, online: bool) -> bool {
        self.report(ConnectionQuality::from_online(online))
    }
}

#[async_trait]
impl ConnectivitySignal for ChannelSignal {
    async fn next(&mut self) -> Option<ConnectionQuality> {
        self.rx.recv().await
    }
}
