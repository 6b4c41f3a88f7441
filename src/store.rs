// Persistence for the session engine: one JSON blob, written through on every mutation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::StoreError;
use crate::models::PersistedState;

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the last saved state. `Ok(None)` when nothing was saved yet.
    async fn load(&self) -> Result<Option<PersistedState>, StoreError>;
    /// Replace the saved state.
    async fn save(&self, state: &PersistedState) -> Result<(), StoreError>;
}

/// In-process store holding the serialized blob. Clones share the same slot.
#[derive(Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with raw JSON, e.g. a blob written by an older build.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(raw.into()))),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.lock().clone()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<Option<PersistedState>, StoreError> {
        let raw = self.slot.lock().clone();
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        let raw = serde_json::to_string(state)?;
        *self.slot.lock() = Some(raw);
        Ok(())
    }
}

/// Store backed by a JSON file. Saves go to a sibling temp file and are renamed into place.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<Option<PersistedState>, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        let raw = serde_json::to_vec(state)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("saved {} bytes of state to {}", raw.len(), self.path.display());
        Ok(())
    }
}
