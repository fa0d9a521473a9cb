//! Engine configuration.
//!
//! Configuration can be built in code or loaded from a TOML file:
//!
//! ```toml
//! path = "/var/lib/strata/main"
//! memory_bytes = 67108864
//! sync_writes = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use strata_common::constants::{DEFAULT_MEMORY_BUDGET, MIN_CACHE_PAGES, PAGE_SIZE};
use strata_storage::{DataManagerConfig, PageCacheConfig};
use strata_wal::{SyncPolicy, WalConfig};

use crate::error::{EngineError, EngineResult};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path prefix shared by the engine's files (`<path>.db`, `<path>.log`,
    /// `<path>.xid`, `<path>.bt`).
    pub path: PathBuf,

    /// Page cache budget in bytes.
    #[serde(default = "default_memory_bytes")]
    pub memory_bytes: usize,

    /// Force every log append to disk.
    #[serde(default = "default_sync_writes")]
    pub sync_writes: bool,
}

fn default_memory_bytes() -> usize {
    DEFAULT_MEMORY_BUDGET
}

fn default_sync_writes() -> bool {
    true
}

impl EngineConfig {
    /// Creates a default configuration for files at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            memory_bytes: default_memory_bytes(),
            sync_writes: default_sync_writes(),
        }
    }

    /// Sets the page cache budget in bytes.
    #[must_use]
    pub fn with_memory_bytes(mut self, bytes: usize) -> Self {
        self.memory_bytes = bytes;
        self
    }

    /// Enables or disables forced log writes.
    #[must_use]
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to TOML string.
    pub fn to_toml(&self) -> EngineResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(EngineError::config("path must not be empty"));
        }
        if self.memory_bytes < MIN_CACHE_PAGES * PAGE_SIZE {
            return Err(EngineError::config(format!(
                "memory_bytes must be at least {} ({} pages)",
                MIN_CACHE_PAGES * PAGE_SIZE,
                MIN_CACHE_PAGES
            )));
        }
        Ok(())
    }

    /// Returns the page cache configuration.
    pub fn cache_config(&self) -> PageCacheConfig {
        PageCacheConfig::from_memory_size(self.memory_bytes)
    }

    /// Returns the log configuration.
    pub fn wal_config(&self) -> WalConfig {
        let policy = if self.sync_writes {
            SyncPolicy::EveryWrite
        } else {
            SyncPolicy::Never
        };
        WalConfig::new().with_sync_policy(policy)
    }

    /// Returns the data manager configuration.
    pub fn data_manager_config(&self) -> DataManagerConfig {
        DataManagerConfig::new()
            .with_cache(self.cache_config())
            .with_wal(self.wal_config())
    }
}
