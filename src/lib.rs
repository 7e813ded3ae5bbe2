//! # DocVault
//!
//! A process-local, file-backed JSON document store with:
//! - Hierarchical keys validated against path traversal
//! - Atomic document writes (temp file + rename)
//! - Per-key reader/writer locks with writer priority and timeouts
//! - Linearizable read-modify-write updates (no lost updates)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Consumers                             │
//! │          (sessions, tasks, caches, CLI tooling)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ read / write / update / remove / list
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Storage                                │
//! │          (key validation, JSON, atomic files)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ acquire_read / acquire_write
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     LockManager                              │
//! │      (per-key RW locks, writer priority, timeouts)           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use docvault::{Config, Storage, StorageKey};
//! use serde_json::{json, Value};
//!
//! let storage = Storage::open(Config::builder().data_dir("./data").build())?;
//! let key = StorageKey::new(["counter"])?;
//!
//! storage.write(&key, &json!({ "count": 0 }))?;
//! let updated: Value = storage.update(&key, |doc: &mut Value| {
//!     doc["count"] = json!(doc["count"].as_u64().unwrap_or(0) + 1);
//! })?;
//! assert_eq!(updated["count"], 1);
//! # Ok::<(), docvault::VaultError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod lock;
pub mod storage;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{VaultError, Result};
pub use config::{Config, SyncStrategy};
pub use lock::{LockGuard, LockKind, LockManager, LockStats};
pub use storage::{validate_key, Storage, StorageKey};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of DocVault
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
