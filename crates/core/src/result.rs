//! Result type definition and extension traits.
//!
//! Provides combinators for setup Results without unwrap/expect/panic.

use crate::error::Error;

/// The standard Result type for offload setup operations.
///
/// # Examples
///
/// ```ignore
/// fn operation() -> Result<ArchiveLayer> {
///     let layer = ArchiveLayer::builder(config).store(store).build()?;
///     Ok(layer)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait providing logging combinators for Results.
pub trait ResultExt<T> {
    /// Log the error at error level and pass the Result through unchanged.
    #[must_use]
    fn log_error(self, context: &str) -> Self;

    /// Inspect the error without consuming the Result.
    #[must_use]
    fn inspect_error<F: FnOnce(&Error)>(self, f: F) -> Self;
}

impl<T> ResultExt<T> for Result<T> {
    fn log_error(self, context: &str) -> Self {
        if let Err(ref e) = self {
            tracing::error!(error = %e, "{context}");
        }
        self
    }

    fn inspect_error<F: FnOnce(&Error)>(self, f: F) -> Self {
        if let Err(ref e) = self {
            f(e);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_error_passes_ok_through() {
        let result: Result<i32> = Ok(42);
        assert!(matches!(result.log_error("loading config"), Ok(42)));
    }

    #[test]
    fn test_log_error_passes_err_through() {
        let result: Result<i32> = Err(Error::invalid_config("bad"));
        assert!(matches!(
            result.log_error("loading config"),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_inspect_error_called_on_err() {
        let mut seen = false;
        let result: Result<i32> = Err(Error::invalid_config("bad"));
        let _ = result.inspect_error(|_| seen = true);
        assert!(seen);
    }

    #[test]
    fn test_inspect_error_not_called_on_ok() {
        let mut seen = false;
        let result: Result<i32> = Ok(1);
        let _ = result.inspect_error(|_| seen = true);
        assert!(!seen);
    }
}
