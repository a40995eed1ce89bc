//! Snapshot persistence for the resource tree

use super::ResourceStore;
use crate::core::{Resource, Result, SclError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::info;

const SNAPSHOT_FORMAT_VERSION: u32 = 1;

// ============================================================================
// Tree Snapshot
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub resource_count: usize,
}

/// Every stored document, in store order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub metadata: SnapshotMetadata,
    pub resources: Vec<Resource>,
}

impl TreeSnapshot {
    pub fn new(resources: Vec<Resource>) -> Self {
        Self {
            metadata: SnapshotMetadata {
                version: SNAPSHOT_FORMAT_VERSION,
                created_at: Utc::now(),
                resource_count: resources.len(),
            },
            resources,
        }
    }
}

// ============================================================================
// Snapshot Manager
// ============================================================================

#[derive(Debug, Clone)]
pub struct SnapshotManager {
    snapshot_path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path.exists()
    }

    /// Writes the snapshot through a temp file + rename so a crash never
    /// leaves a truncated file behind.
    pub fn save(&self, snapshot: &TreeSnapshot) -> Result<()> {
        let dir = match self.snapshot_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let temp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, snapshot)
                .map_err(|e| SclError::Storage(format!("Failed to serialize snapshot: {}", e)))?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.snapshot_path)
            .map_err(|e| SclError::Storage(format!("Failed to rename snapshot: {}", e)))?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<TreeSnapshot>> {
        if !self.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.snapshot_path)?;
        let snapshot: TreeSnapshot = serde_json::from_slice(&data)
            .map_err(|e| SclError::Storage(format!("Failed to deserialize snapshot: {}", e)))?;
        if snapshot.metadata.version != SNAPSHOT_FORMAT_VERSION {
            return Err(SclError::Storage(format!(
                "Unsupported snapshot version {}",
                snapshot.metadata.version
            )));
        }
        Ok(Some(snapshot))
    }

    /// Dumps the whole store. Holds the write side of the SCL lock so no
    /// eviction or registration write interleaves with the dump.
    pub async fn checkpoint(&self, store: &dyn ResourceStore, lock: &RwLock<()>) -> Result<usize> {
        let _guard = lock.write().await;
        let resources = store.scan("").await?;
        let count = resources.len();
        let snapshot = TreeSnapshot::new(resources);
        let manager = self.clone();
        tokio::task::spawn_blocking(move || manager.save(&snapshot))
            .await
            .map_err(|e| SclError::Internal(format!("snapshot writer failed: {}", e)))??;
        info!(path = %self.snapshot_path.display(), resources = count, "snapshot written");
        Ok(count)
    }

    /// Loads the snapshot (if any) into the store, skipping documents that
    /// already exist. Returns the number of restored documents.
    pub async fn restore(&self, store: &dyn ResourceStore, lock: &RwLock<()>) -> Result<usize> {
        let manager = self.clone();
        let loaded = tokio::task::spawn_blocking(move || manager.load())
            .await
            .map_err(|e| SclError::Internal(format!("snapshot reader failed: {}", e)))??;
        let Some(snapshot) = loaded else {
            return Ok(0);
        };
        let _guard = lock.write().await;
        let mut restored = 0;
        for resource in snapshot.resources {
            if !store.exists(&resource.uri).await? {
                store.create(resource).await?;
                restored += 1;
            }
        }
        info!(path = %self.snapshot_path.display(), resources = restored, "snapshot restored");
        Ok(restored)
    }
}
