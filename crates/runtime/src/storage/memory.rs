//! In-memory blob store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BlobPointer, BlobReader, BlobWriter, StoreError, StoreResult, encode_snapshot};
use crate::virtual_objects::StateSnapshot;

/// Blob store keeping encoded snapshots in process memory.
///
/// Snapshots are stored JSON-encoded so a round trip goes through the same
/// encoding a durable store would use.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<BlobPointer, Vec<u8>>>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Check if no blob is stored.
    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    /// Check if a blob exists behind `pointer`.
    pub async fn contains(&self, pointer: &BlobPointer) -> bool {
        self.blobs.read().await.contains_key(pointer)
    }

    /// Drop the blob behind `pointer`, returning whether it existed.
    pub async fn remove(&self, pointer: &BlobPointer) -> bool {
        self.blobs.write().await.remove(pointer).is_some()
    }
}

#[async_trait]
impl BlobWriter for MemoryBlobStore {
    async fn write(&self, snapshot: &StateSnapshot) -> StoreResult<BlobPointer> {
        let bytes = encode_snapshot(snapshot)?;
        let pointer = BlobPointer::new(format!("mem://{}", Uuid::new_v4()));
        self.blobs.write().await.insert(pointer.clone(), bytes);
        Ok(pointer)
    }
}

#[async_trait]
impl BlobReader for MemoryBlobStore {
    async fn read(&self, pointer: &BlobPointer) -> StoreResult<StateSnapshot> {
        let blobs = self.blobs.read().await;
        let bytes = blobs
            .get(pointer)
            .ok_or_else(|| StoreError::not_found(pointer.as_str()))?;
        serde_json::from_slice(bytes).map_err(|e| StoreError::corrupt(format!("'{pointer}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::HashMap;

    use chrono::Utc;

    use super::*;
    use crate::virtual_objects::{ObjectId, StateValue};

    fn snapshot() -> StateSnapshot {
        let mut state = HashMap::new();
        state.insert("count".to_string(), StateValue::Integer(7));
        StateSnapshot::new(ObjectId::new("count", "obj-1"), state, Utc::now())
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let store = MemoryBlobStore::new();
        let original = snapshot();

        let pointer = store.write(&original).await.unwrap();
        assert!(store.contains(&pointer).await);
        assert_eq!(store.len().await, 1);

        let loaded = store.read(&pointer).await.unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn test_removed_blob_is_not_found() {
        let store = MemoryBlobStore::new();
        let pointer = store.write(&snapshot()).await.unwrap();

        assert!(store.remove(&pointer).await);
        assert!(store.is_empty().await);

        let err = store.read(&pointer).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_clones_share_blobs() {
        let store = MemoryBlobStore::new();
        let other = store.clone();

        let pointer = store.write(&snapshot()).await.unwrap();
        assert!(other.contains(&pointer).await);
    }

    #[tokio::test]
    async fn test_non_finite_float_is_unwritable() {
        let store = MemoryBlobStore::new();
        let mut poisoned = snapshot();
        poisoned.state.insert(
            "samples".to_string(),
            StateValue::List(vec![StateValue::Float(1.5), StateValue::Float(f64::NAN)]),
        );

        let err = store.write(&poisoned).await.unwrap_err();
        assert!(matches!(err, StoreError::Unwritable { .. }));
        assert!(!err.is_retryable());
        assert!(store.is_empty().await);
    }
}
