//! File-backed durable store.
//!
//! One `<namespace>.json` file per namespace. Writes go to a temporary
//! sibling first and are renamed into place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::persistence::DurableStore;

/// Directory-backed [`DurableStore`].
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) the snapshot directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, namespace: &str) -> Result<PathBuf> {
        let valid = !namespace.is_empty()
            && namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid || namespace.starts_with('.') {
            return Err(SyncError::Persistence(format!(
                "invalid namespace '{}'",
                namespace
            )));
        }
        Ok(self.dir.join(format!("{}.json", namespace)))
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn load(&self, namespace: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(namespace)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, namespace: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(namespace)?;
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, &path).await?;

        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    async fn remove(&self, namespace: &str) -> Result<()> {
        let path = self.path_for(namespace)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
