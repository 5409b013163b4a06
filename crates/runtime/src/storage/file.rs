//! Filesystem-backed blob store.
//!
//! Each snapshot is written as a JSON file named by a fresh v4 UUID inside
//! the configured directory. The pointer is the file's full path.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::{BlobPointer, BlobReader, BlobWriter, StoreError, StoreResult, encode_snapshot};
use crate::virtual_objects::StateSnapshot;

/// Directory used when none is configured.
pub const DEFAULT_SWAP_DIR: &str = "/tmp/swap-virtual-object";

/// Blob store writing one JSON file per snapshot.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Create a store rooted at `dir`.
    ///
    /// The directory itself is created on first write if its parent exists.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory blobs are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for FileBlobStore {
    fn default() -> Self {
        Self::new(DEFAULT_SWAP_DIR)
    }
}

fn classify_write(path: &Path, err: &std::io::Error) -> StoreError {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::NotADirectory => {
            StoreError::unwritable(format!("path '{}' does not exist: {err}", path.display()))
        }
        _ => StoreError::transient(format!("failed to write '{}': {err}", path.display())),
    }
}

#[async_trait]
impl BlobWriter for FileBlobStore {
    async fn write(&self, snapshot: &StateSnapshot) -> StoreResult<BlobPointer> {
        let bytes = encode_snapshot(snapshot)?;

        // Only the leaf directory is created; a missing parent is unwritable.
        match tokio::fs::create_dir(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(classify_write(&self.dir, &e)),
        }

        let path = self.dir.join(Uuid::new_v4().to_string());
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| classify_write(&path, &e))?;

        debug!(
            object = %snapshot.object_id,
            keys = snapshot.len(),
            path = %path.display(),
            "Wrote state blob"
        );
        Ok(BlobPointer::new(path.to_string_lossy()))
    }
}

#[async_trait]
impl BlobReader for FileBlobStore {
    async fn read(&self, pointer: &BlobPointer) -> StoreResult<StateSnapshot> {
        let bytes = tokio::fs::read(pointer.as_str())
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => StoreError::not_found(pointer.as_str()),
                _ => StoreError::transient(format!("failed to read '{pointer}': {e}")),
            })?;

        let snapshot: StateSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::corrupt(format!("'{pointer}': {e}")))?;

        debug!(object = %snapshot.object_id, %pointer, "Read state blob");
        Ok(snapshot)
    }
}
