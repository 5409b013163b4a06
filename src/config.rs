//! Demo configuration.
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or no file at all) yields a working setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use offload_core::{Error, Result};
use offload_runtime::archiving::ArchiveConfig;
use offload_runtime::storage::DEFAULT_SWAP_DIR;
use offload_runtime::virtual_objects::HostConfig;
use serde::{Deserialize, Serialize};

fn default_store_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SWAP_DIR)
}

/// Blob store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory offloaded state is written to.
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

/// Effective configuration of the demo binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `FileReadFailed` if the file cannot be read and
    /// `TomlParseFailed` if it is not valid configuration.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `TomlParseFailed` on malformed input.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::toml_parse_failed(e.to_string()))
    }

    /// Apply command-line overrides.
    #[must_use]
    pub fn with_overrides(
        mut self,
        expiry_ms: Option<u64>,
        check_ms: Option<u64>,
        dir: Option<PathBuf>,
    ) -> Self {
        if let Some(ms) = expiry_ms {
            self.archive.expiry_ms = ms;
        }
        if let Some(ms) = check_ms {
            self.archive.check_interval_ms = Some(ms);
        }
        if let Some(dir) = dir {
            self.store.dir = dir;
        }
        self
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.archive.validate()?;
        self.host.validate()
    }

    /// Longest time an idle object can stay resident before the next check
    /// offloads it.
    #[must_use]
    pub fn eviction_horizon(&self) -> Duration {
        self.archive
            .expiry()
            .saturating_add(self.archive.check_interval())
            .saturating_add(Duration::from_millis(self.host.timer_tick_ms))
    }
}
