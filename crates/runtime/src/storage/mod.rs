//! External blob stores for offloaded object state.
//!
//! An evicted object's domain state is written as one opaque blob. The store
//! returns a [`BlobPointer`] that is kept in the object's offload record and
//! later handed back to the reader to rehydrate the object.

mod error;
mod file;
mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::{StoreError, StoreResult};
pub use file::{DEFAULT_SWAP_DIR, FileBlobStore};
pub use memory::MemoryBlobStore;

use crate::virtual_objects::StateSnapshot;

/// Opaque address of an externalized blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobPointer(String);

impl BlobPointer {
    /// Create a pointer from its raw form.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw pointer string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BlobPointer {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for BlobPointer {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Encode a snapshot as a JSON blob.
///
/// JSON has no representation for non-finite floats, so a snapshot holding
/// one is rejected as unwritable instead of being silently corrupted.
pub(crate) fn encode_snapshot(snapshot: &StateSnapshot) -> StoreResult<Vec<u8>> {
    let unencodable = snapshot.unencodable_keys();
    if !unencodable.is_empty() {
        return Err(StoreError::unwritable(format!(
            "non-finite float under key(s) {unencodable:?} of {}",
            snapshot.object_id
        )));
    }
    serde_json::to_vec(snapshot)
        .map_err(|e| StoreError::unwritable(format!("failed to encode snapshot: {e}")))
}

/// Externalizes a state snapshot.
#[async_trait]
pub trait BlobWriter: Send + Sync {
    /// Write the snapshot and return the pointer addressing it.
    ///
    /// Errors must be classified: [`StoreError::is_retryable`] decides whether
    /// the caller retries or reschedules.
    async fn write(&self, snapshot: &StateSnapshot) -> StoreResult<BlobPointer>;
}

/// Reads back a previously externalized snapshot.
#[async_trait]
pub trait BlobReader: Send + Sync {
    /// Read the snapshot addressed by `pointer`.
    async fn read(&self, pointer: &BlobPointer) -> StoreResult<StateSnapshot>;
}
