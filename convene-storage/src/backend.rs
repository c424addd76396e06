//! Physical store backend — the capability seam over the storage volume.
//!
//! A backend knows how to enumerate, create, open and delete isolated
//! stores by meeting id. The concrete implementation is chosen once at
//! startup from [`BackendConfig`]; callers only ever see the trait.

use crate::error::{StorageError, StorageResult};
use crate::meeting_store::MeetingStore;
use async_trait::async_trait;
use convene_types::MeetingId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Capability interface over the physical storage volume.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Enumerates the meeting ids with a physically present store.
    async fn list(&self) -> StorageResult<Vec<MeetingId>>;

    /// Whether a store physically exists for `meeting_id`.
    async fn exists(&self, meeting_id: &str) -> StorageResult<bool>;

    /// Allocates a fresh store. Opening an existing id is not an error —
    /// creation is idempotent at this layer; uniqueness is the registry's
    /// concern.
    async fn create(&self, meeting_id: &str) -> StorageResult<MeetingStore>;

    /// Opens an existing store. Fails with [`StorageError::StoreNotFound`]
    /// when nothing is physically present.
    async fn open(&self, meeting_id: &str) -> StorageResult<MeetingStore>;

    /// Physically removes the store. Idempotent — deleting an absent store
    /// is a no-op.
    async fn delete(&self, meeting_id: &str) -> StorageResult<()>;
}

/// Startup configuration selecting the backend implementation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// One folder per meeting under `root`, each holding a DuckDB file.
    Folder { root: PathBuf },
}

impl BackendConfig {
    /// Resolves the configuration into a concrete backend.
    pub fn build(&self) -> Arc<dyn StoreBackend> {
        match self {
            Self::Folder { root } => Arc::new(FolderBackend::new(root.clone())),
        }
    }
}

/// Folder-per-meeting backend: `<root>/<meeting_id>/store.duckdb`.
pub struct FolderBackend {
    root: PathBuf,
}

const STORE_FILE: &str = "store.duckdb";

impl FolderBackend {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn store_dir(&self, meeting_id: &str) -> StorageResult<PathBuf> {
        validate_store_name(meeting_id)?;
        Ok(self.root.join(meeting_id))
    }

    fn store_file(&self, meeting_id: &str) -> StorageResult<PathBuf> {
        Ok(self.store_dir(meeting_id)?.join(STORE_FILE))
    }
}

/// Meeting ids become directory names; anything outside the opaque-id
/// alphabet is rejected before it can traverse the filesystem.
fn validate_store_name(meeting_id: &str) -> StorageResult<()> {
    let valid = !meeting_id.is_empty()
        && meeting_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidStoreName(meeting_id.to_string()))
    }
}

#[async_trait]
impl StoreBackend for FolderBackend {
    async fn list(&self) -> StorageResult<Vec<MeetingId>> {
        if !tokio::fs::try_exists(&self.root).await? {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            // Only folders that actually contain a store file count.
            if tokio::fs::try_exists(entry.path().join(STORE_FILE)).await? {
                ids.push(name);
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn exists(&self, meeting_id: &str) -> StorageResult<bool> {
        let file = self.store_file(meeting_id)?;
        Ok(tokio::fs::try_exists(&file).await?)
    }

    async fn create(&self, meeting_id: &str) -> StorageResult<MeetingStore> {
        let dir = self.store_dir(meeting_id)?;
        tokio::fs::create_dir_all(&dir).await?;
        let file = dir.join(STORE_FILE);
        debug!(meeting_id, path = %file.display(), "creating meeting store");
        open_store(meeting_id, &file)
    }

    async fn open(&self, meeting_id: &str) -> StorageResult<MeetingStore> {
        let file = self.store_file(meeting_id)?;
        if !tokio::fs::try_exists(&file).await? {
            return Err(StorageError::StoreNotFound(meeting_id.to_string()));
        }
        open_store(meeting_id, &file)
    }

    async fn delete(&self, meeting_id: &str) -> StorageResult<()> {
        let dir = self.store_dir(meeting_id)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(meeting_id, "deleted meeting store");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn open_store(meeting_id: &str, file: &Path) -> StorageResult<MeetingStore> {
    MeetingStore::open(meeting_id, file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_list_open_delete() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FolderBackend::new(dir.path().to_path_buf());

        assert!(backend.list().await.unwrap().is_empty());
        assert!(!backend.exists("m-1").await.unwrap());

        backend.create("m-1").await.unwrap();
        backend.create("m-2").await.unwrap();
        assert_eq!(backend.list().await.unwrap(), vec!["m-1", "m-2"]);
        assert!(backend.exists("m-1").await.unwrap());

        backend.open("m-1").await.unwrap();
        backend.delete("m-1").await.unwrap();
        assert!(!backend.exists("m-1").await.unwrap());
        assert_eq!(backend.list().await.unwrap(), vec!["m-2"]);

        // Idempotent delete
        backend.delete("m-1").await.unwrap();
    }

    #[tokio::test]
    async fn open_missing_store_errors() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FolderBackend::new(dir.path().to_path_buf());
        let err = backend.open("nope").await.unwrap_err();
        assert!(matches!(err, StorageError::StoreNotFound(_)));
    }

    #[tokio::test]
    async fn traversal_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FolderBackend::new(dir.path().to_path_buf());
        for bad in ["../escape", "a/b", "", "a b"] {
            let err = backend.exists(bad).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidStoreName(_)), "{bad}");
        }
    }

    #[tokio::test]
    async fn config_builds_folder_backend() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BackendConfig::Folder { root: dir.path().to_path_buf() };
        let backend = cfg.build();
        backend.create("m-1").await.unwrap();
        assert!(backend.exists("m-1").await.unwrap());
    }
}
