//! WAL configuration.

/// Sync policy for WAL writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// Force the record and the checksum header to disk on every append.
    #[default]
    EveryWrite,
    /// Never sync (fastest, unsafe - for testing only).
    Never,
}

/// Configuration for the Write-Ahead Log.
#[derive(Debug, Clone, Default)]
pub struct WalConfig {
    /// Sync policy for durability.
    pub sync_policy: SyncPolicy,
}

impl WalConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sync policy.
    #[must_use]
    pub fn with_sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync_policy = policy;
        self
    }

    /// Returns true if appends must reach the disk before returning.
    pub fn syncs_every_write(&self) -> bool {
        self.sync_policy == SyncPolicy::EveryWrite
    }
}
