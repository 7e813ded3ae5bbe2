//! Storage Module
//!
//! Hierarchical JSON document store on top of plain files.
//!
//! ## Responsibilities
//! - Map `StorageKey` segments onto a nested directory layout
//! - Atomic persistence (temp file + rename)
//! - Per-key locking through the shared `LockManager`
//! - Prefix listing that only ever yields real documents
//!
//! ## On-Disk Layout
//! ```text
//! {data_dir}/
//!   ├── session/
//!   │     ├── abc123.json       ← ["session", "abc123"]
//!   │     ├── .docvault-Xy12Ab.tmp ← in-flight write, never listed
//!   │     └── message/
//!   │           └── m1.json     ← ["session", "message", "m1"]
//!   └── counter.json            ← ["counter"]
//! ```

mod file;
mod key;
mod store;

pub use file::DOCUMENT_EXTENSION;
pub use key::{validate_key, StorageKey, SEPARATOR};
pub use store::Storage;
