//! Opaque blob backends for the serialized collection
//!
//! The store never interprets what a backend keeps; it hands over the full
//! encoded collection on every save and asks for it back on load.

use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Durable key-value slot holding the encoded collection
#[async_trait]
pub trait BlobStore: Send + Sync + Debug {
    /// Read the stored bytes; `None` when nothing was ever saved
    async fn load(&self) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the stored bytes
    async fn save(&self, bytes: &[u8]) -> Result<(), StoreError>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// JSON file on disk, replaced atomically (write temp file, then rename)
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    path: PathBuf,
}

impl FileBlobStore {
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
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
impl BlobStore for FileBlobStore {
    async fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    async fn save(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StoreError::io(dir, e))?;
        }

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process slot, mainly for tests
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    bytes: Mutex<Option<Vec<u8>>>,
    saves: AtomicUsize,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
}

impl MemoryBlobStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated slot
    #[must_use]
    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let store = Self::default();
        *store.bytes.lock() = Some(bytes.into());
        store
    }

    /// Current contents
    #[must_use]
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.bytes.lock().clone()
    }

    /// Number of successful saves
    #[inline]
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make every subsequent load fail
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent save fail
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("load refused".to_string()));
        }
        Ok(self.bytes())
    }

    async fn save(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("save refused".to_string()));
        }
        *self.bytes.lock() = Some(bytes.to_vec());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_blob_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let blob = FileBlobStore::new(dir.path().join("apps.json"));
        assert!(blob.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_blob_creates_parent_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let blob = FileBlobStore::new(dir.path().join("nested").join("apps.json"));

        blob.save(b"[1]").await.unwrap();
        blob.save(b"[2]").await.unwrap();

        assert_eq!(blob.load().await.unwrap().unwrap(), b"[2]");
        assert!(!blob.tmp_path().exists());
    }

    #[tokio::test]
    async fn memory_blob_counts_and_fails_on_demand() {
        let blob = MemoryBlobStore::new();
        blob.save(b"a").await.unwrap();
        assert_eq!(blob.save_count(), 1);

        blob.fail_saves(true);
        assert!(blob.save(b"b").await.is_err());
        assert_eq!(blob.bytes().unwrap(), b"a");

        blob.fail_loads(true);
        assert!(blob.load().await.is_err());
    }
}
