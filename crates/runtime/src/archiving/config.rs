//! Archiving configuration.

use std::time::Duration;

use offload_core::{Error, Result};
use serde::{Deserialize, Serialize};

const fn default_expiry_ms() -> u64 {
    1_000
}

/// Idle expiry and check cadence of the archiving layer.
///
/// Durations are kept in whole milliseconds so the configuration reads
/// naturally from TOML. Sub-millisecond parts of a [`Duration`] are rounded
/// up, so a positive duration never becomes zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Idle time after which an object's state is offloaded.
    #[serde(default = "default_expiry_ms")]
    pub expiry_ms: u64,
    /// Idle-check period. Defaults to half the expiry.
    #[serde(default)]
    pub check_interval_ms: Option<u64>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            expiry_ms: default_expiry_ms(),
            check_interval_ms: None,
        }
    }
}

fn as_millis(duration: Duration) -> u64 {
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    if duration.subsec_nanos() % 1_000_000 == 0 {
        millis
    } else {
        millis.saturating_add(1)
    }
}

impl ArchiveConfig {
    /// Create a configuration with the given expiry and the default check
    /// interval.
    #[must_use]
    pub fn new(expiry: Duration) -> Self {
        Self {
            expiry_ms: as_millis(expiry),
            check_interval_ms: None,
        }
    }

    /// Set an explicit check interval.
    #[must_use]
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval_ms = Some(as_millis(interval));
        self
    }

    /// Idle expiry.
    #[must_use]
    pub const fn expiry(&self) -> Duration {
        Duration::from_millis(self.expiry_ms)
    }

    /// Effective check interval.
    ///
    /// The derived default is half the expiry, but at least 1ms for any
    /// positive expiry.
    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        match self.check_interval_ms {
            Some(ms) => Duration::from_millis(ms),
            None if self.expiry_ms == 1 => Duration::from_millis(1),
            None => Duration::from_millis(self.expiry_ms / 2),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the expiry or the effective check interval
    /// is zero.
    pub fn validate(&self) -> Result<()> {
        if self.expiry_ms == 0 {
            return Err(Error::invalid_config("expiry must be greater than 0"));
        }
        if self.check_interval().is_zero() {
            return Err(Error::invalid_config(
                "check interval must be greater than 0",
            ));
        }
        Ok(())
    }
}
