//! Key-value blob persistence.
//!
//! The favorite list is persisted as one opaque blob under a fixed key. The
//! [`BlobStore`] trait is the seam: [`FileBlobStore`] writes one JSON file per
//! key on disk, [`MemoryBlobStore`] keeps blobs in memory for tests and for
//! hosts that persist elsewhere.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors that can occur when reading or writing blobs
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid blob key: {0:?}")]
    InvalidKey(String),

    #[error("Blob storage lock poisoned")]
    Poisoned,
}

/// Opaque key-value blob store.
#[cfg_attr(test, mockall::automock)]
pub trait BlobStore: Send + Sync {
    /// Read the blob stored under `key`, `None` if nothing was stored yet.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the blob stored under `key`.
    fn save(&self, key: &str, value: &str) -> Result<()>;
}

/// Blob store writing `<dir>/<key>.json` files.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: Utf8PathBuf,
}

impl FileBlobStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new<P: AsRef<Utf8Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create storage directory: {}", dir))?;
        }

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// File backing `key`. Keys are plain names, never paths.
    pub fn blob_path(&self, key: &str) -> Result<Utf8PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');

        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()).into());
        }

        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl BlobStore for FileBlobStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.blob_path(key)?;

        if !path.exists() {
            tracing::debug!("No blob stored at {}", path);
            return Ok(None);
        }

        let contents =
            fs::read_to_string(&path).with_context(|| format!("Failed to read blob: {}", path))?;

        Ok(Some(contents))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let path = self.blob_path(key)?;

        // Write to a sibling file first so a crash never leaves a torn blob.
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, value)
            .with_context(|| format!("Failed to write blob: {}", tmp_path))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to replace blob: {}", path))?;

        tracing::debug!("Saved blob {} ({} bytes)", path, value.len());
        Ok(())
    }
}

/// In-memory blob store. Clones share the same blobs.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blob currently stored under `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.blobs.read().ok()?.get(key).cloned()
    }
}

impl BlobStore for MemoryBlobStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let blobs = self.blobs.read().map_err(|_| StorageError::Poisoned)?;
        Ok(blobs.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let mut blobs = self.blobs.write().map_err(|_| StorageError::Poisoned)?;
        blobs.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (FileBlobStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().join("storage")).unwrap();
        let store = FileBlobStore::new(&dir).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_file_store_creates_directory() {
        let (store, _temp_dir) = create_test_store();
        assert!(store.dir().exists());
    }

    #[test]
    fn test_file_store_missing_blob() {
        let (store, _temp_dir) = create_test_store();
        assert!(store.load("favorites-storage").unwrap().is_none());
    }

    #[test]
    fn test_file_store_overwrites() {
        let (store, _temp_dir) = create_test_store();

        store.save("favorites-storage", "[1]").unwrap();
        store.save("favorites-storage", "[2]").unwrap();

        assert_eq!(store.load("favorites-storage").unwrap().as_deref(), Some("[2]"));
        assert!(!store.blob_path("favorites-storage").unwrap().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let (store, _temp_dir) = create_test_store();

        assert!(store.save("../escape", "x").is_err());
        assert!(store.save("", "x").is_err());
        assert!(store.load(".hidden").is_err());
    }

    #[test]
    fn test_memory_store_shared_between_clones() {
        let store = MemoryBlobStore::new();
        let clone = store.clone();

        store.save("key", "value").unwrap();

        assert_eq!(clone.load("key").unwrap().as_deref(), Some("value"));
        assert_eq!(clone.get("key").as_deref(), Some("value"));
    }
}
