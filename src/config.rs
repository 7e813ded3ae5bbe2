//! Configuration for DocVault
//!
//! Centralized configuration with sensible defaults. The embedding process
//! decides the values; nothing here reads the environment.

use std::path::PathBuf;
use std::time::Duration;

/// Default time a lock acquisition waits before failing (30 s)
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Main configuration for a DocVault instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory of the document namespace
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── session/
    ///     │     └── abc123.json   (key ["session", "abc123"])
    ///     └── counter.json        (key ["counter"])
    pub data_dir: PathBuf,

    /// Whether document writes are fsynced (file before rename, directory after)
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Lock Configuration
    // -------------------------------------------------------------------------
    /// How long storage operations wait for a per-key lock
    pub lock_timeout: Duration,
}

/// Durability of document writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync the temp file before rename and, on Unix, its directory after
    /// (safest, slowest)
    Always,

    /// Leave flushing to the OS. Readers still never see a torn document,
    /// but a crash may lose the latest write.
    Never,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./docvault_data"),
            sync_strategy: SyncStrategy::Always,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root of the document namespace)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the sync strategy for document writes
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the lock timeout
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    /// Set the lock timeout (in milliseconds)
    pub fn lock_timeout_ms(self, ms: u64) -> Self {
        self.lock_timeout(Duration::from_millis(ms))
    }

    pub fn build(self) -> Config {
        self.config
    }
}
