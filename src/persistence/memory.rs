//! In-process durable store, for tests and hosts without a disk.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Result, SyncError};
use crate::persistence::DurableStore;

/// Map-backed [`DurableStore`]. Survives manager restarts as long as the
/// same instance is reused.
#[derive(Debug, Default)]
pub struct MemoryStore {
    namespaces: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes stored under `namespace`.
    pub fn raw(&self, namespace: &str) -> Option<Vec<u8>> {
        self.namespaces
            .lock()
            .ok()
            .and_then(|map| map.get(namespace).cloned())
    }
}

fn poisoned() -> SyncError {
    SyncError::Persistence("memory store lock poisoned".to_string())
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn load(&self, namespace: &str) -> Result<Option<Vec<u8>>> {
        let map = self.namespaces.lock().map_err(|_| poisoned())?;
        Ok(map.get(namespace).cloned())
    }

    async fn save(&self, namespace: &str, bytes: Vec<u8>) -> Result<()> {
        let mut map = self.namespaces.lock().map_err(|_| poisoned())?;
        map.insert(namespace.to_string(), bytes);
        Ok(())
    }

    async fn remove(&self, namespace: &str) -> Result<()> {
        let mut map = self.namespaces.lock().map_err(|_| poisoned())?;
        map.remove(namespace);
        Ok(())
    }
}
