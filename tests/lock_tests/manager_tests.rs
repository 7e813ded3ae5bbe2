//! Tests for LockManager
//!
//! These tests verify:
//! - Shared readers, exclusive writers
//! - Writer priority over newly arriving readers
//! - FIFO order among queued writers, batch wake of queued readers
//! - Timeout semantics (caller only, holders and other waiters unaffected)
//! - Idle entries are removed from the table

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam::channel;
use docvault::{LockKind, LockManager, LockStats, VaultError};

// =============================================================================
// Helper Functions
// =============================================================================

const SHORT: Duration = Duration::from_millis(50);
const LONG: Duration = Duration::from_secs(10);

fn setup_manager() -> Arc<LockManager> {
    Arc::new(LockManager::new(LONG))
}

/// Poll until `cond` holds, panicking after a generous deadline
fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(2));
    }
}

fn waiting_writers(manager: &LockManager, key: &str) -> usize {
    manager.stats(key).map(|s| s.waiting_writers).unwrap_or(0)
}

fn waiting_readers(manager: &LockManager, key: &str) -> usize {
    manager.stats(key).map(|s| s.waiting_readers).unwrap_or(0)
}

// =============================================================================
// Basic Acquisition Tests
// =============================================================================

#[test]
fn test_readers_share_a_key() {
    let manager = setup_manager();

    let r1 = manager.acquire_read("k").unwrap();
    let r2 = manager.acquire_read_timeout("k", Duration::ZERO).unwrap();

    assert_eq!(r1.kind(), LockKind::Read);
    assert_eq!(r2.key(), "k");
    assert_eq!(
        manager.stats("k"),
        Some(LockStats {
            readers: 2,
            ..Default::default()
        })
    );
}

#[test]
fn test_writer_is_exclusive() {
    let manager = setup_manager();
    let _w = manager.acquire_write("k").unwrap();

    let err = manager.acquire_write_timeout("k", SHORT).unwrap_err();
    assert!(err.is_timeout());

    let err = manager.acquire_read_timeout("k", SHORT).unwrap_err();
    assert!(err.is_timeout());
}

#[test]
fn test_writer_waits_for_readers() {
    let manager = setup_manager();
    let _r = manager.acquire_read("k").unwrap();

    let err = manager.acquire_write_timeout("k", SHORT).unwrap_err();
    assert!(err.is_timeout());
}

#[test]
fn test_keys_are_independent() {
    let manager = setup_manager();
    let _a = manager.acquire_write("a").unwrap();

    let b = manager.acquire_write_timeout("b", Duration::ZERO);
    assert!(b.is_ok());
}

#[test]
fn test_timeout_error_carries_key_and_duration() {
    let manager = setup_manager();
    let _w = manager.acquire_write("session/abc").unwrap();

    match manager.acquire_read_timeout("session/abc", SHORT) {
        Err(VaultError::LockTimeout { key, timeout }) => {
            assert_eq!(key, "session/abc");
            assert_eq!(timeout, SHORT);
        }
        other => panic!("expected LockTimeout, got {:?}", other),
    };
}

#[test]
fn test_timeout_waits_at_least_the_duration() {
    let manager = setup_manager();
    let _w = manager.acquire_write("k").unwrap();

    let start = Instant::now();
    assert!(manager.acquire_write_timeout("k", SHORT).is_err());
    assert!(start.elapsed() >= SHORT);
}

// =============================================================================
// Release & Cleanup Tests
// =============================================================================

#[test]
fn test_idle_entry_removed_after_release() {
    let manager = setup_manager();

    {
        let _r1 = manager.acquire_read("k").unwrap();
        let _r2 = manager.acquire_read("k").unwrap();
        assert_eq!(manager.entry_count(), 1);
    }

    assert_eq!(manager.entry_count(), 0);
    assert_eq!(manager.stats("k"), None);
}

#[test]
fn test_explicit_release() {
    let manager = setup_manager();

    let w = manager.acquire_write("k").unwrap();
    w.release();

    assert_eq!(manager.entry_count(), 0);
    assert!(manager.acquire_write_timeout("k", Duration::ZERO).is_ok());
}

#[test]
fn test_release_frees_one_unit() {
    let manager = setup_manager();

    let r1 = manager.acquire_read("k").unwrap();
    let _r2 = manager.acquire_read("k").unwrap();
    r1.release();

    assert_eq!(manager.stats("k").unwrap().readers, 1);
}

#[test]
fn test_timed_out_waiter_leaves_no_trace() {
    let manager = setup_manager();

    let w = manager.acquire_write("k").unwrap();
    assert!(manager.acquire_read_timeout("k", SHORT).is_err());
    assert_eq!(manager.stats("k").unwrap().waiting_readers, 0);

    drop(w);
    assert_eq!(manager.entry_count(), 0);
}

#[test]
fn test_with_write_returns_value_and_releases() {
    let manager = setup_manager();

    let value = manager.with_write("k", || 42).unwrap();

    assert_eq!(value, 42);
    assert_eq!(manager.entry_count(), 0);
}

#[test]
fn test_with_read_fails_while_writer_holds() {
    let manager = Arc::new(LockManager::new(SHORT));
    let _w = manager.acquire_write("k").unwrap();

    let result = manager.with_read("k", || unreachable!());
    assert!(result.unwrap_err().is_timeout());
}

#[test]
fn test_panic_in_critical_section_releases() {
    let manager = setup_manager();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        manager.with_write("k", || panic!("boom")).unwrap();
    }));

    assert!(result.is_err());
    assert_eq!(manager.entry_count(), 0);
    assert!(manager.acquire_write_timeout("k", Duration::ZERO).is_ok());
}

// =============================================================================
// Fairness Tests
// =============================================================================

#[test]
fn test_read_after_writer_released_succeeds_immediately() {
    let manager = setup_manager();

    let w = manager.acquire_write("k").unwrap();
    assert!(manager.acquire_read_timeout("k", SHORT).unwrap_err().is_timeout());

    w.release();
    assert!(manager.acquire_read_timeout("k", Duration::ZERO).is_ok());
}

#[test]
fn test_queued_writer_blocks_new_readers() {
    let manager = setup_manager();
    let reader = manager.acquire_read("k").unwrap();

    let writer = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || {
            let _w = manager.acquire_write("k").unwrap();
        })
    };
    wait_until(|| waiting_writers(&manager, "k") == 1);

    // A reader is active, but a writer is queued: new readers must wait
    assert!(manager.acquire_read_timeout("k", SHORT).unwrap_err().is_timeout());

    drop(reader);
    writer.join().unwrap();
    wait_until(|| manager.entry_count() == 0);
}

#[test]
fn test_writers_granted_in_fifo_order() {
    let manager = setup_manager();
    let order = Arc::new(Mutex::new(Vec::new()));
    let holder = manager.acquire_write("k").unwrap();

    let mut handles = Vec::new();
    for id in 0..3 {
        let manager_clone = Arc::clone(&manager);
        let order = Arc::clone(&order);
        handles.push(thread::spawn(move || {
            let _w = manager_clone.acquire_write("k").unwrap();
            order.lock().unwrap().push(id);
        }));
        wait_until(|| waiting_writers(&manager, "k") == id + 1);
    }

    drop(holder);
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
}

#[test]
fn test_writer_before_earlier_queued_readers() {
    let manager = setup_manager();
    let order = Arc::new(Mutex::new(Vec::new()));

    // Reader holds, writer queues, then a reader queues behind it
    let holder = manager.acquire_read("k").unwrap();

    let writer = {
        let manager = Arc::clone(&manager);
        let order = Arc::clone(&order);
        thread::spawn(move || {
            let _w = manager.acquire_write("k").unwrap();
            order.lock().unwrap().push("writer");
            thread::sleep(Duration::from_millis(20));
        })
    };
    wait_until(|| waiting_writers(&manager, "k") == 1);

    let reader = {
        let manager = Arc::clone(&manager);
        let order = Arc::clone(&order);
        thread::spawn(move || {
            let _r = manager.acquire_read("k").unwrap();
            order.lock().unwrap().push("reader");
        })
    };
    wait_until(|| waiting_readers(&manager, "k") == 1);

    drop(holder);
    writer.join().unwrap();
    reader.join().unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["writer", "reader"]);
}

#[test]
fn test_waiting_readers_woken_as_one_batch() {
    let manager = setup_manager();
    let holder = manager.acquire_write("k").unwrap();

    let (acquired_tx, acquired_rx) = channel::unbounded();
    let (done_tx, done_rx) = channel::unbounded::<()>();

    let mut handles = Vec::new();
    for _ in 0..3 {
        let manager = Arc::clone(&manager);
        let acquired_tx = acquired_tx.clone();
        let done_rx = done_rx.clone();
        handles.push(thread::spawn(move || {
            let _r = manager.acquire_read("k").unwrap();
            acquired_tx.send(()).unwrap();
            // Hold until the main thread has seen every reader inside
            let _ = done_rx.recv_timeout(LONG);
        }));
    }
    wait_until(|| waiting_readers(&manager, "k") == 3);

    drop(holder);
    for _ in 0..3 {
        acquired_rx.recv_timeout(LONG).unwrap();
    }
    assert_eq!(manager.stats("k").unwrap().readers, 3);

    drop(done_tx);
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(manager.entry_count(), 0);
}

#[test]
fn test_timeout_does_not_disturb_other_waiters() {
    let manager = setup_manager();
    let holder = manager.acquire_write("k").unwrap();

    let writer = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.acquire_write("k").map(|_| ()))
    };
    wait_until(|| waiting_writers(&manager, "k") == 1);

    assert!(manager.acquire_read_timeout("k", SHORT).is_err());
    assert_eq!(manager.stats("k").unwrap().waiting_writers, 1);
    assert!(manager.stats("k").unwrap().writer);

    drop(holder);
    assert!(writer.join().unwrap().is_ok());
}

#[test]
fn test_readers_admitted_when_queued_writer_times_out() {
    let manager = setup_manager();
    let holder = manager.acquire_read("k").unwrap();

    let writer = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || {
            manager
                .acquire_write_timeout("k", Duration::from_millis(200))
                .map(|_| ())
        })
    };
    wait_until(|| waiting_writers(&manager, "k") == 1);

    let reader = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.acquire_read_timeout("k", LONG).map(|_| ()))
    };
    wait_until(|| waiting_readers(&manager, "k") == 1);

    // The writer gives up while the first reader still holds the key
    assert!(writer.join().unwrap().unwrap_err().is_timeout());
    assert!(reader.join().unwrap().is_ok());

    drop(holder);
    assert_eq!(manager.entry_count(), 0);
}

#[test]
fn test_contended_writers_all_succeed() {
    let manager = setup_manager();
    let counter = Arc::new(Mutex::new(0u32));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = Arc::clone(&manager);
        let counter = Arc::clone(&counter);
        handles.push(thread::spawn(move || {
            for _ in 0..50 {
                manager
                    .with_write("counter", || {
                        let mut guard = counter.lock().unwrap();
                        *guard += 1;
                    })
                    .unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(*counter.lock().unwrap(), 400);
    assert_eq!(manager.entry_count(), 0);
}

#[test]
fn test_default_timeout() {
    assert_eq!(LockManager::default().default_timeout(), Duration::from_secs(30));
    assert_eq!(setup_manager().default_timeout(), LONG);
}
