//! Invocation error types.

use thiserror::Error;

use crate::storage::StoreError;

/// Errors surfaced by a handler invocation.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// Business failure; never retried.
    #[error("terminal failure: {message}")]
    Terminal { message: String },

    /// Temporary failure; the host retries the invocation.
    #[error("transient failure: {message}")]
    Transient { message: String },

    /// Blob store failure, retryable per the store's classification.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("unknown service '{service}'")]
    UnknownService { service: String },

    #[error("unknown handler '{handler}' on service '{service}'")]
    UnknownHandler { service: String, handler: String },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// The host was shut down or dropped.
    #[error("object host is unavailable")]
    HostUnavailable,
}

impl InvocationError {
    /// Create a terminal error.
    pub fn terminal(message: impl Into<String>) -> Self {
        Self::Terminal {
            message: message.into(),
        }
    }

    /// Create a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Create an unknown service error.
    pub fn unknown_service(service: impl Into<String>) -> Self {
        Self::UnknownService {
            service: service.into(),
        }
    }

    /// Create an unknown handler error.
    pub fn unknown_handler(service: impl Into<String>, handler: impl Into<String>) -> Self {
        Self::UnknownHandler {
            service: service.into(),
            handler: handler.into(),
        }
    }

    /// Check if error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transient { .. } => true,
            Self::Store(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for InvocationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}

/// Result type for handler invocations.
pub type InvocationResult<T> = Result<T, InvocationError>;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_terminal_not_retryable() {
        let err = InvocationError::terminal("negative balance");
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "terminal failure: negative balance");
    }

    #[test]
    fn test_transient_retryable() {
        assert!(InvocationError::transient("busy").is_retryable());
    }

    #[test]
    fn test_store_error_keeps_classification() {
        let retryable: InvocationError = StoreError::transient("disk busy").into();
        let fatal: InvocationError = StoreError::unwritable("no such dir").into();

        assert!(retryable.is_retryable());
        assert!(!fatal.is_retryable());
        assert_eq!(
            fatal.to_string(),
            "store error: blob is unwritable: no such dir"
        );
    }

    #[test]
    fn test_unknown_handler_display() {
        let err = InvocationError::unknown_handler("count", "reset");
        assert_eq!(
            err.to_string(),
            "unknown handler 'reset' on service 'count'"
        );
    }

    #[test]
    fn test_serde_json_conversion() {
        let parse: Result<u32, _> = serde_json::from_str("nope");
        let err: InvocationError = parse.map_err(InvocationError::from).unwrap_err();
        assert!(matches!(err, InvocationError::Serialization { .. }));
    }
}
