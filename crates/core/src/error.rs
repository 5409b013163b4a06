//! Core error types for offload setup and configuration.
//!
//! These errors are raised before any object traffic is accepted: loading a
//! configuration file, validating the archiving configuration, or assembling
//! an object definition. Runtime failures use the runtime crate's own types.

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for offload setup operations.
#[derive(Debug, Error)]
pub enum Error {
    // I/O errors
    #[error("failed to read file '{path}': {reason}")]
    FileReadFailed { path: PathBuf, reason: String },

    // Parsing errors
    #[error("TOML parse error: {reason}")]
    TomlParseFailed { reason: String },

    // Setup errors
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("invalid object definition '{object}': {reason}")]
    InvalidDefinition { object: String, reason: String },

    // Generic I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a file read error.
    pub fn file_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a TOML parse error.
    pub fn toml_parse_failed(reason: impl Into<String>) -> Self {
        Self::TomlParseFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid object definition error.
    pub fn invalid_definition(object: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            object: object.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error was caused by invalid setup parameters.
    #[must_use]
    pub const fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::InvalidDefinition { .. }
        )
    }
}
