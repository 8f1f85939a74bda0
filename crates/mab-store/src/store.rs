//! Artifact collection with whole-collection persistence
//!
//! The in-memory collection is the source of truth for a session. Saves
//! always write the full collection (last write wins) and are serialized so a
//! later save never writes an older snapshot than an earlier one.

use crate::blob::BlobStore;
use crate::error::StoreError;
use mab_artifact::{decode_collection, encode_collection_with, raw_record_id, Artifact, ArtifactId};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Ordered artifact collection, newest first
#[derive(Debug)]
pub struct ArtifactStore {
    artifacts: Mutex<Vec<Artifact>>,
    /// Stored records that did not decode; written back after the collection
    unreadable: Mutex<Vec<Value>>,
    blob: Arc<dyn BlobStore>,
    save_lane: tokio::sync::Mutex<()>,
}

impl ArtifactStore {
    /// Empty store backed by `blob`; call [`load_all`](Self::load_all) to hydrate
    #[must_use]
    pub fn new(blob: Arc<dyn BlobStore>) -> Self {
        Self {
            artifacts: Mutex::new(Vec::new()),
            unreadable: Mutex::new(Vec::new()),
            blob,
            save_lane: tokio::sync::Mutex::new(()),
        }
    }

    /// Backend description, for logs
    #[must_use]
    pub fn location(&self) -> String {
        self.blob.describe()
    }

    /// Read the collection from the blob store and make it the in-memory one.
    ///
    /// Nothing stored yields an empty collection. Undecodable records are
    /// logged and kept aside so later saves preserve them.
    ///
    /// # Errors
    /// Backend failures and a top-level payload that is not a collection.
    pub async fn load_all(&self) -> Result<Vec<Artifact>, StoreError> {
        let Some(bytes) = self.blob.load().await? else {
            tracing::debug!(location = %self.location(), "no stored collection");
            self.replace_all(Vec::new());
            self.unreadable.lock().clear();
            return Ok(Vec::new());
        };

        let decoded = decode_collection(&bytes).map_err(StoreError::Decode)?;
        if !decoded.unreadable.is_empty() {
            let ids: Vec<&str> = decoded
                .unreadable
                .iter()
                .map(|r| raw_record_id(r).unwrap_or("<no id>"))
                .collect();
            tracing::warn!(?ids, "kept undecodable artifact records as stored");
        }
        *self.unreadable.lock() = decoded.unreadable;
        tracing::info!(count = decoded.artifacts.len(), "loaded artifact collection");

        self.replace_all(decoded.artifacts.clone());
        Ok(decoded.artifacts)
    }

    /// Serialize `artifacts` as the full stored collection, followed by any
    /// undecodable records from the last load
    ///
    /// # Errors
    /// Encoding or backend failures.
    pub async fn save_all(&self, artifacts: &[Artifact]) -> Result<(), StoreError> {
        let unreadable = self.unreadable.lock().clone();
        let bytes = encode_collection_with(artifacts, &unreadable).map_err(StoreError::Encode)?;
        self.blob.save(&bytes).await?;
        tracing::debug!(count = artifacts.len(), "saved artifact collection");
        Ok(())
    }

    /// Save the current in-memory collection.
    ///
    /// The snapshot is taken after acquiring the save lane.
    ///
    /// # Errors
    /// Same as [`save_all`](Self::save_all).
    pub async fn persist(&self) -> Result<(), StoreError> {
        let _lane = self.save_lane.lock().await;
        let snapshot = self.snapshot();
        self.save_all(&snapshot).await
    }

    /// Replace the in-memory collection
    pub fn replace_all(&self, artifacts: Vec<Artifact>) {
        *self.artifacts.lock() = artifacts;
    }

    /// Place a new artifact at the front
    pub fn insert_front(&self, artifact: Artifact) {
        self.artifacts.lock().insert(0, artifact);
    }

    /// Run `mutator` on the artifact with `id`; `None` if absent
    pub fn update_by_id<R>(&self, id: ArtifactId, mutator: impl FnOnce(&mut Artifact) -> R) -> Option<R> {
        let mut artifacts = self.artifacts.lock();
        artifacts.iter_mut().find(|a| a.id() == id).map(mutator)
    }

    /// Remove and return the artifact with `id`
    pub fn remove_by_id(&self, id: ArtifactId) -> Option<Artifact> {
        let mut artifacts = self.artifacts.lock();
        let idx = artifacts.iter().position(|a| a.id() == id)?;
        Some(artifacts.remove(idx))
    }

    #[must_use]
    pub fn get(&self, id: ArtifactId) -> Option<Artifact> {
        self.artifacts.lock().iter().find(|a| a.id() == id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: ArtifactId) -> bool {
        self.artifacts.lock().iter().any(|a| a.id() == id)
    }

    /// Copy of the collection, newest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<Artifact> {
        self.artifacts.lock().clone()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<ArtifactId> {
        self.artifacts.lock().iter().map(Artifact::id).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.lock().is_empty()
    }

    /// Number of stored records kept verbatim because they did not decode
    #[must_use]
    pub fn unreadable_count(&self) -> usize {
        self.unreadable.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use mab_artifact::ArtifactStatus;

    fn store() -> ArtifactStore {
        ArtifactStore::new(Arc::new(MemoryBlobStore::new()))
    }

    #[test]
    fn insert_front_orders_newest_first() {
        let s = store();
        let first = Artifact::new("first");
        let second = Artifact::new("second");
        let (a, b) = (first.id(), second.id());

        s.insert_front(first);
        s.insert_front(second);

        assert_eq!(s.ids(), vec![b, a]);
    }

    #[test]
    fn update_by_id_hits_only_target() {
        let s = store();
        let target = Artifact::new("target");
        let id = target.id();
        s.insert_front(target);
        s.insert_front(Artifact::new("other"));

        let res = s.update_by_id(id, |a| a.complete_generation("<p/>"));
        assert!(matches!(res, Some(Ok(()))));
        assert_eq!(s.get(id).unwrap().status(), ArtifactStatus::Ready);
        assert_eq!(s.snapshot()[0].status(), ArtifactStatus::Pending);
    }

    #[test]
    fn missing_ids_are_none() {
        let s = store();
        let ghost = ArtifactId::new();
        assert!(s.update_by_id(ghost, |_| ()).is_none());
        assert!(s.remove_by_id(ghost).is_none());
        assert!(s.get(ghost).is_none());
    }

    #[test]
    fn remove_by_id() {
        let s = store();
        let a = Artifact::new("a");
        let id = a.id();
        s.insert_front(a);

        assert_eq!(s.remove_by_id(id).unwrap().instruction(), "a");
        assert!(s.is_empty());
    }

    #[tokio::test]
    async fn empty_blob_loads_empty() {
        let s = store();
        s.insert_front(Artifact::new("stale"));
        assert!(s.load_all().await.unwrap().is_empty());
        assert!(s.is_empty());
    }
}
