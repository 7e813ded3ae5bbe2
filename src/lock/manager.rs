//! Lock Manager
//!
//! Owns the table of per-key lock entries and hands out guards.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::DEFAULT_LOCK_TIMEOUT;
use crate::error::{Result, VaultError};

use super::{LockGuard, LockKind};

/// Per-key reader/writer lock table
///
/// ## Concurrency:
/// - `entries`: Protected by one Mutex; every counter and queue is only
///   touched while it is held
/// - Waiting callers never hold the mutex: they block on their own channel
/// - All methods use `&self`, share it behind an `Arc`
pub struct LockManager {
    /// key → bookkeeping, present only while the key is held or contended
    entries: Mutex<HashMap<String, LockEntry>>,

    /// Source of unique waiter ids (atomic, lock-free)
    next_waiter_id: AtomicU64,

    /// Timeout used by `acquire_read` / `acquire_write`
    default_timeout: Duration,
}

/// Snapshot of one key's lock state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockStats {
    /// Readers currently holding the key
    pub readers: usize,
    /// Whether a writer currently holds the key
    pub writer: bool,
    /// Readers queued for the key
    pub waiting_readers: usize,
    /// Writers queued for the key
    pub waiting_writers: usize,
}

/// A caller blocked in `acquire_*`
struct Waiter {
    id: u64,
    notify: Sender<()>,
}

impl Waiter {
    fn grant(self) {
        // Capacity 1 and the receiver outlives the queue slot, so this never blocks
        let _ = self.notify.send(());
    }
}

#[derive(Default)]
struct LockEntry {
    readers: usize,
    writer: bool,
    waiting_readers: VecDeque<Waiter>,
    waiting_writers: VecDeque<Waiter>,
}

impl LockEntry {
    /// Fast path for a new request, before it would be queued
    fn try_grant(&mut self, kind: LockKind) -> bool {
        match kind {
            LockKind::Read if !self.writer && self.waiting_writers.is_empty() => {
                self.readers += 1;
                true
            }
            LockKind::Write
                if !self.writer && self.readers == 0 && self.waiting_writers.is_empty() =>
            {
                self.writer = true;
                true
            }
            _ => false,
        }
    }

    fn enqueue(&mut self, kind: LockKind, waiter: Waiter) {
        match kind {
            LockKind::Read => self.waiting_readers.push_back(waiter),
            LockKind::Write => self.waiting_writers.push_back(waiter),
        }
    }

    /// Hand the key to whoever is next. Returns how many waiters were woken.
    fn process(&mut self) -> usize {
        if self.writer || self.readers > 0 {
            return 0;
        }

        if let Some(writer) = self.waiting_writers.pop_front() {
            self.writer = true;
            writer.grant();
            return 1;
        }

        self.admit_readers()
    }

    /// Wake every queued reader as one batch
    fn admit_readers(&mut self) -> usize {
        let batch = self.waiting_readers.len();
        self.readers += batch;
        for reader in self.waiting_readers.drain(..) {
            reader.grant();
        }
        batch
    }

    /// Remove a queued waiter. False means it was already granted.
    fn withdraw(&mut self, kind: LockKind, id: u64) -> bool {
        let queue = match kind {
            LockKind::Read => &mut self.waiting_readers,
            LockKind::Write => &mut self.waiting_writers,
        };
        match queue.iter().position(|w| w.id == id) {
            Some(pos) => {
                queue.remove(pos);
                true
            }
            None => false,
        }
    }

    fn is_idle(&self) -> bool {
        self.readers == 0
            && !self.writer
            && self.waiting_readers.is_empty()
            && self.waiting_writers.is_empty()
    }

    fn stats(&self) -> LockStats {
        LockStats {
            readers: self.readers,
            writer: self.writer,
            waiting_readers: self.waiting_readers.len(),
            waiting_writers: self.waiting_writers.len(),
        }
    }
}

impl LockManager {
    /// Create a lock table whose plain `acquire_*` calls wait `default_timeout`
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_waiter_id: AtomicU64::new(0),
            default_timeout,
        }
    }

    /// Acquire a shared lock on `key` using the default timeout
    pub fn acquire_read(&self, key: &str) -> Result<LockGuard<'_>> {
        self.acquire(key, LockKind::Read, self.default_timeout)
    }

    /// Acquire an exclusive lock on `key` using the default timeout
    pub fn acquire_write(&self, key: &str) -> Result<LockGuard<'_>> {
        self.acquire(key, LockKind::Write, self.default_timeout)
    }

    /// Acquire a shared lock on `key`, failing with `LockTimeout` after `timeout`
    ///
    /// Granted at once unless a writer holds the key or is queued for it.
    pub fn acquire_read_timeout(&self, key: &str, timeout: Duration) -> Result<LockGuard<'_>> {
        self.acquire(key, LockKind::Read, timeout)
    }

    /// Acquire an exclusive lock on `key`, failing with `LockTimeout` after `timeout`
    ///
    /// Granted at once only if nobody holds or is queued for the key.
    pub fn acquire_write_timeout(&self, key: &str, timeout: Duration) -> Result<LockGuard<'_>> {
        self.acquire(key, LockKind::Write, timeout)
    }

    /// Run `f` while holding a read lock on `key`
    pub fn with_read<T>(&self, key: &str, f: impl FnOnce() -> T) -> Result<T> {
        let _guard = self.acquire_read(key)?;
        Ok(f())
    }

    /// Run `f` while holding a write lock on `key`
    pub fn with_write<T>(&self, key: &str, f: impl FnOnce() -> T) -> Result<T> {
        let _guard = self.acquire_write(key)?;
        Ok(f())
    }

    /// Lock state for `key`, or `None` if nobody holds or waits for it
    pub fn stats(&self, key: &str) -> Option<LockStats> {
        self.entries.lock().get(key).map(LockEntry::stats)
    }

    /// Number of keys currently held or contended
    pub fn entry_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Timeout used when none is given
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn acquire(&self, key: &str, kind: LockKind, timeout: Duration) -> Result<LockGuard<'_>> {
        let (tx, rx) = channel::bounded(1);
        let id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut entries = self.entries.lock();
            let entry = entries.entry(key.to_string()).or_default();

            if entry.try_grant(kind) {
                trace!(key, %kind, "lock granted");
                return Ok(LockGuard::new(self, key.to_string(), kind));
            }

            entry.enqueue(kind, Waiter { id, notify: tx });
        }

        debug!(key, %kind, ?timeout, "waiting for lock");

        if rx.recv_timeout(timeout).is_ok() {
            debug!(key, %kind, "lock granted after wait");
            return Ok(LockGuard::new(self, key.to_string(), kind));
        }

        // Timer fired. A release may have granted us between the timeout and
        // re-taking the mutex; the queue is the source of truth.
        let mut entries = self.entries.lock();
        let withdrawn = match entries.get_mut(key) {
            Some(entry) => {
                let withdrawn = entry.withdraw(kind, id);
                let unblocks_readers =
                    kind == LockKind::Write && !entry.writer && entry.waiting_writers.is_empty();
                if withdrawn && unblocks_readers {
                    // Readers queued behind this writer are no longer blocked
                    entry.admit_readers();
                }
                if entry.is_idle() {
                    entries.remove(key);
                }
                withdrawn
            }
            None => false,
        };

        if withdrawn {
            warn!(key, %kind, ?timeout, "lock acquisition timed out");
            Err(VaultError::LockTimeout {
                key: key.to_string(),
                timeout,
            })
        } else {
            debug!(key, %kind, "lock granted at timeout");
            Ok(LockGuard::new(self, key.to_string(), kind))
        }
    }

    /// Give back one unit of `kind` on `key` and wake the next waiter(s)
    pub(super) fn release(&self, key: &str, kind: LockKind) {
        let mut entries = self.entries.lock();

        let Some(entry) = entries.get_mut(key) else {
            warn!(key, %kind, "release of a key that is not held");
            return;
        };

        match kind {
            LockKind::Read => entry.readers = entry.readers.saturating_sub(1),
            LockKind::Write => entry.writer = false,
        }

        let woken = entry.process();
        if woken > 0 {
            trace!(key, woken, "woke waiters");
        }

        if entry.is_idle() {
            entries.remove(key);
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}
