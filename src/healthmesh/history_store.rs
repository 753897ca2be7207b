//! Per-user persistence of orchestration results.
//!
//! The store is keyed by user id; each user maps to an insertion-ordered list of
//! [`WellnessPlan`] records. The pipeline only needs two operations — append one
//! result, list a user's results — so the trait stays deliberately narrow and the
//! default implementation is a flat, pretty-printed JSON file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::healthmesh::error::HealthMeshError;
use crate::healthmesh::orchestrator::WellnessPlan;

/// Narrow interface the orchestrator persists through.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one result record to `user_id`'s history.
    async fn append(&self, user_id: &str, plan: WellnessPlan) -> Result<(), HealthMeshError>;

    /// The user's records in insertion order; empty for an unknown user.
    async fn list(&self, user_id: &str) -> Result<Vec<WellnessPlan>, HealthMeshError>;
}

type HistoryMap = BTreeMap<String, Vec<WellnessPlan>>;

/// Flat-file JSON store: `{ "<user_id>": [plan, ...], ... }`.
///
/// Every mutation is a load-modify-save of the whole file, serialized by an async
/// mutex so concurrent requests can't interleave their read-modify-write cycles.
pub struct JsonHistoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonHistoryStore {
    /// Create a store backed by the given file path. The file (and its parent
    /// directories) are created lazily on the first append.
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonHistoryStore {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    async fn load_map(&self) -> Result<HistoryMap, HealthMeshError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(HistoryMap::new());
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&raw).map_err(|err| {
            HealthMeshError::Storage(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("corrupt history file {}: {}", self.path.display(), err),
            ))
        })
    }

    async fn save_map(&self, map: &HistoryMap) -> Result<(), HealthMeshError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let raw = serde_json::to_string_pretty(map).map_err(|err| {
            HealthMeshError::Storage(std::io::Error::new(std::io::ErrorKind::Other, err))
        })?;
        tokio::fs::write(&self.path, raw).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for JsonHistoryStore {
    async fn append(&self, user_id: &str, plan: WellnessPlan) -> Result<(), HealthMeshError> {
        let _guard = self.lock.lock().await;
        let mut map = self.load_map().await?;
        map.entry(user_id.to_string()).or_default().push(plan);
        self.save_map(&map).await
    }

    async fn list(&self, user_id: &str) -> Result<Vec<WellnessPlan>, HealthMeshError> {
        let _guard = self.lock.lock().await;
        let map = self.load_map().await?;
        Ok(map.get(user_id).cloned().unwrap_or_default())
    }
}

/// In-memory store for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryHistoryStore {
    entries: Mutex<HistoryMap>,
}

impl MemoryHistoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        MemoryHistoryStore::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, user_id: &str, plan: WellnessPlan) -> Result<(), HealthMeshError> {
        let mut entries = self.entries.lock().await;
        entries.entry(user_id.to_string()).or_default().push(plan);
        Ok(())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<WellnessPlan>, HealthMeshError> {
        let entries = self.entries.lock().await;
        Ok(entries.get(user_id).cloned().unwrap_or_default())
    }
}
