//! Persistence Module
//!
//! Durable key/value snapshots of cache and queue state.
//!
//! Each namespace holds one versioned JSON [`Snapshot`]. Readers treat a
//! missing, unreadable or foreign-version snapshot as empty state.

mod file;
mod memory;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

pub use file::FileStore;
pub use memory::MemoryStore;

// == Public Constants ==
/// Namespace of the cache snapshot
pub const CACHE_NAMESPACE: &str = "offline_sync.cache";

/// Namespace of the queue snapshot
pub const QUEUE_NAMESPACE: &str = "offline_sync.queue";

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

// == Durable Store Trait ==
/// Byte-level persistence keyed by namespace.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Returns the stored bytes, or `None` if nothing was saved.
    async fn load(&self, namespace: &str) -> Result<Option<Vec<u8>>>;

    /// Replaces the bytes stored under `namespace`.
    async fn save(&self, namespace: &str, bytes: Vec<u8>) -> Result<()>;

    /// Drops whatever is stored under `namespace`.
    async fn remove(&self, namespace: &str) -> Result<()>;
}

// == Snapshot ==
/// Versioned envelope around a list of persisted items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub version: u32,
    /// Unix milliseconds at save time
    pub saved_at: u64,
    pub items: Vec<T>,
}

impl<T: Serialize> Snapshot<T> {
    pub fn new(items: Vec<T>, saved_at: u64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at,
            items,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl<T: DeserializeOwned> Snapshot<T> {
    /// Decodes a snapshot, returning no items for corrupt or
    /// foreign-version data.
    pub fn decode_or_empty(namespace: &str, bytes: &[u8]) -> Vec<T> {
        match serde_json::from_slice::<Snapshot<T>>(bytes) {
            Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => snapshot.items,
            Ok(snapshot) => {
                warn!(
                    "Ignoring {} snapshot with unsupported version {}",
                    namespace, snapshot.version
                );
                Vec::new()
            }
            Err(e) => {
                warn!("Ignoring corrupt {} snapshot: {}", namespace, e);
                Vec::new()
            }
        }
    }
}

// == Load Items ==
/// Loads and decodes the items stored under `namespace`.
///
/// Read failures are logged and yield an empty list.
pub async fn load_items<T: DeserializeOwned>(store: &dyn DurableStore, namespace: &str) -> Vec<T> {
    match store.load(namespace).await {
        Ok(Some(bytes)) => Snapshot::decode_or_empty(namespace, &bytes),
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("Failed to read {} snapshot: {}", namespace, e);
            Vec::new()
        }
    }
}

// == Save Items ==
/// Encodes and writes `items` under `namespace`. An empty list drops the
/// stored snapshot instead.
///
/// Failures are logged; the in-memory state stays authoritative.
pub async fn save_items<T: Serialize>(
    store: &dyn DurableStore,
    namespace: &str,
    items: Vec<T>,
    now_ms: u64,
) {
    let result = if items.is_empty() {
        store.remove(namespace).await
    } else {
        match Snapshot::new(items, now_ms).encode() {
            Ok(bytes) => store.save(namespace, bytes).await,
            Err(e) => Err(e),
        }
    };

    if let Err(e) = result {
        warn!("Failed to persist {} snapshot: {}", namespace, e);
    }
}
