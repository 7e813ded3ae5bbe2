//! Lock Guard
//!
//! Scoped acquisition returned by the lock manager.

use super::{LockKind, LockManager};

/// A held read or write lock on one key
///
/// Dropping the guard releases exactly one unit of the kind it was granted
/// and wakes whoever is next in line. `release()` does the same explicitly;
/// since it consumes the guard, a lock can never be released twice.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    key: String,
    kind: LockKind,
    released: bool,
}

impl<'a> LockGuard<'a> {
    pub(super) fn new(manager: &'a LockManager, key: String, kind: LockKind) -> Self {
        Self {
            manager,
            key,
            kind,
            released: false,
        }
    }

    /// The key this guard holds
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether this is a read or a write lock
    pub fn kind(&self) -> LockKind {
        self.kind
    }

    /// Release the lock now instead of at end of scope
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.manager.release(&self.key, self.kind);
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl std::fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .finish()
    }
}
