//! Blob store error types.
//!
//! All errors are explicit, typed, and classified - the store decides what is
//! retryable, the archiving layer only reacts to the classification.

use thiserror::Error;

/// Errors that can occur while writing or reading an externalized blob.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The destination cannot accept the blob (e.g. the target path is missing).
    #[error("blob is unwritable: {reason}")]
    Unwritable { reason: String },

    /// No blob exists behind the pointer.
    #[error("blob not found: '{pointer}'")]
    NotFound { pointer: String },

    /// The blob exists but cannot be decoded.
    #[error("blob is corrupt: {reason}")]
    Corrupt { reason: String },

    /// Temporary failure; the same operation may succeed later.
    #[error("transient store failure: {reason}")]
    Transient { reason: String },
}

impl StoreError {
    /// Create an unwritable error.
    pub fn unwritable(reason: impl Into<String>) -> Self {
        Self::Unwritable {
            reason: reason.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(pointer: impl Into<String>) -> Self {
        Self::NotFound {
            pointer: pointer.into(),
        }
    }

    /// Create a corrupt blob error.
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt {
            reason: reason.into(),
        }
    }

    /// Create a transient error.
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    /// Check if error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Result type for blob store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwritable_error() {
        let err = StoreError::unwritable("path does not exist");
        assert!(matches!(err, StoreError::Unwritable { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_not_found_error() {
        let err = StoreError::not_found("/tmp/swap/abc");
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "blob not found: '/tmp/swap/abc'");
    }

    #[test]
    fn test_corrupt_error() {
        let err = StoreError::corrupt("expected value at line 1");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_transient_error() {
        let err = StoreError::transient("disk busy");
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "transient store failure: disk busy");
    }
}
