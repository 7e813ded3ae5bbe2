//! Lock Module
//!
//! Per-key reader/writer locks with writer priority and timeouts.
//!
//! ## Responsibilities
//! - Many concurrent readers or one writer per key
//! - Queued writers are admitted before queued readers (no writer starvation)
//! - FIFO order among waiting writers
//! - Bounded waits: every acquisition carries a timeout
//! - Idle keys are dropped from the table to bound memory
//!
//! ## Queue Processing (on every release)
//! ```text
//!   writer active or readers active? ──yes──▶ stay blocked
//!              │ no
//!              ▼
//!   writers waiting? ──yes──▶ grant ONE writer (front of queue)
//!              │ no
//!              ▼
//!   grant ALL currently waiting readers as one batch
//!              │
//!              ▼
//!   entry idle and unqueued? ──yes──▶ remove entry
//! ```
//!
//! Waiting callers block their thread on a crossbeam channel; a grant is a
//! send on that channel made while the table mutex is held.

mod guard;
mod manager;

pub use guard::LockGuard;
pub use manager::{LockManager, LockStats};

/// The kind of access a guard holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    /// Shared access (any number of readers)
    Read,

    /// Exclusive access (one writer, no readers)
    Write,
}

impl std::fmt::Display for LockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockKind::Read => f.write_str("read"),
            LockKind::Write => f.write_str("write"),
        }
    }
}
