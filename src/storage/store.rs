//! Document Store
//!
//! Validated, atomically persisted JSON documents addressed by `StorageKey`.
//!
//! ## Responsibilities
//! - Validate every key before touching the filesystem
//! - Persist documents with temp file + rename
//! - Serialize read-modify-write sequences per key (no lost updates)
//! - List the documents under a prefix, skipping anything that is not one

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Result, VaultError};
use crate::lock::{LockGuard, LockManager};

use super::file;
use super::key::{validate_directory_segments, StorageKey};

/// File-backed document store
///
/// ## Concurrency:
/// - `read`/`exists` hold the key's read lock
/// - `write`/`update`/`remove` hold the key's write lock, so a reader never
///   races the rename and an update never interleaves with another writer
/// - The lock key for a document is its display form (`session/abc`)
/// - All methods use `&self`; share the store behind an `Arc`
pub struct Storage {
    /// Store configuration
    config: Config,

    /// Root of the document namespace
    root: PathBuf,

    /// Per-key locks, possibly shared with other consumers
    locks: Arc<LockManager>,
}

impl Storage {
    /// Open or create a store with its own lock table
    pub fn open(config: Config) -> Result<Self> {
        let locks = Arc::new(LockManager::new(config.lock_timeout));
        Self::with_lock_manager(config, locks)
    }

    /// Open or create a store that shares `locks` with other consumers
    pub fn with_lock_manager(config: Config, locks: Arc<LockManager>) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let root = config.data_dir.clone();

        debug!(root = %root.display(), "storage opened");

        Ok(Self {
            config,
            root,
            locks,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Read the document at `key`
    ///
    /// Fails with `NotFound` if there is none.
    pub fn read<T: DeserializeOwned>(&self, key: &StorageKey) -> Result<T> {
        let path = file::document_path(&self.root, key);
        let _guard = self.read_lock(key)?;
        self.load(key, &path)
    }

    /// Whether a document exists at `key`
    pub fn exists(&self, key: &StorageKey) -> Result<bool> {
        let path = file::document_path(&self.root, key);
        let _guard = self.read_lock(key)?;
        Ok(path.is_file())
    }

    /// Create or replace the document at `key`
    pub fn write<T: Serialize + ?Sized>(&self, key: &StorageKey, value: &T) -> Result<()> {
        let path = file::document_path(&self.root, key);
        let contents = serde_json::to_vec_pretty(value)?;

        let _guard = self.write_lock(key)?;
        file::write_atomic(&path, &contents, self.config.sync_strategy)?;

        debug!(%key, bytes = contents.len(), "document written");
        Ok(())
    }

    /// Read-modify-write the document at `key` and return the new value
    ///
    /// `mutator` edits the current value in place. The whole sequence runs
    /// under the key's write lock. Never creates a document: a missing key
    /// fails with `NotFound` and nothing is written.
    pub fn update<T, F>(&self, key: &StorageKey, mutator: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        self.try_update(key, |value: &mut T| {
            mutator(value);
            Ok::<(), VaultError>(())
        })
    }

    /// Like `update`, but the mutator may fail
    ///
    /// A mutator error is returned unchanged, nothing is persisted and the
    /// lock is released. Store errors are converted into the caller's `E`.
    pub fn try_update<T, F, E>(&self, key: &StorageKey, mutator: F) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T) -> std::result::Result<(), E>,
        E: From<VaultError>,
    {
        let path = file::document_path(&self.root, key);
        let _guard = self.write_lock(key)?;

        let mut value: T = self.load(key, &path)?;
        mutator(&mut value)?;

        let contents = serde_json::to_vec_pretty(&value).map_err(VaultError::from)?;
        file::write_atomic(&path, &contents, self.config.sync_strategy)?;

        debug!(%key, bytes = contents.len(), "document updated");
        Ok(value)
    }

    /// Delete the document at `key`; a missing document is not an error
    pub fn remove(&self, key: &StorageKey) -> Result<()> {
        let path = file::document_path(&self.root, key);
        let _guard = self.write_lock(key)?;

        if file::remove_if_exists(&path)? {
            debug!(%key, "document removed");
        }
        Ok(())
    }

    /// Every document key strictly below `prefix`, sorted by display form
    ///
    /// An empty prefix lists the whole store. Directories, stray files and
    /// in-flight temp files are never returned. Prefix segments name
    /// directories, so none of them may end in `.json`.
    pub fn list<S: AsRef<str>>(&self, prefix: &[S]) -> Result<Vec<StorageKey>> {
        validate_directory_segments(prefix)?;

        let dir = file::directory_path(&self.root, prefix);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let base: Vec<String> = prefix.iter().map(|s| s.as_ref().to_string()).collect();
        let mut keys = Vec::new();

        for entry in WalkDir::new(&dir).min_depth(1).follow_links(false) {
            let entry = entry.map_err(|e| {
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory loop while listing"))
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            match Self::key_for_entry(&dir, entry.path(), &base) {
                Some(key) => keys.push(key),
                None => {
                    let name = entry.file_name().to_string_lossy();
                    if file::document_stem(&name).is_some() {
                        warn!(path = %entry.path().display(), "skipping file with unaddressable name");
                    }
                }
            }
        }

        keys.sort_by_cached_key(|key| key.to_string());

        debug!(prefix = ?base, count = keys.len(), "listed documents");
        Ok(keys)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.root
    }

    /// Get the lock table guarding this store
    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.locks
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn read_lock(&self, key: &StorageKey) -> Result<LockGuard<'_>> {
        self.locks
            .acquire_read_timeout(&key.to_string(), self.config.lock_timeout)
    }

    fn write_lock(&self, key: &StorageKey) -> Result<LockGuard<'_>> {
        self.locks
            .acquire_write_timeout(&key.to_string(), self.config.lock_timeout)
    }

    /// Decode the file at `path`; caller holds a lock on `key`
    fn load<T: DeserializeOwned>(&self, key: &StorageKey, path: &Path) -> Result<T> {
        let bytes = file::read_optional(path)?.ok_or_else(|| VaultError::NotFound {
            key: key.to_string(),
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Rebuild the key for a file found under `dir` (which maps to `base`)
    fn key_for_entry(dir: &Path, path: &Path, base: &[String]) -> Option<StorageKey> {
        let relative = path.strip_prefix(dir).ok()?;
        let mut segments = base.to_vec();

        let mut components = relative.components().peekable();
        while let Some(component) = components.next() {
            let name = component.as_os_str().to_str()?;
            if components.peek().is_some() {
                segments.push(name.to_string());
            } else {
                segments.push(file::document_stem(name)?.to_string());
            }
        }

        StorageKey::new(segments).ok()
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
