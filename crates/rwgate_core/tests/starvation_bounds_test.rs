//! Integration tests for the priority relation of each policy.
//!
//! Participants announce on a shared channel while they hold access, so the
//! channel order is the admission order.

use crossbeam_channel::{unbounded, Sender};
use rwgate_core::{Policy, Role, SharedState};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(5);

fn wait_until<F: Fn() -> bool>(cond: F) {
    let deadline = Instant::now() + TIMEOUT;
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached");
        thread::sleep(Duration::from_millis(1));
    }
}

fn spawn_access(
    policy: Policy,
    state: &Arc<SharedState>,
    role: Role,
    tag: &'static str,
    hold: Duration,
    events: Sender<&'static str>,
) -> thread::JoinHandle<()> {
    let state = Arc::clone(state);
    thread::spawn(move || {
        let _access = policy.acquire(role, &state);
        events.send(tag).ok();
        thread::sleep(hold);
    })
}

#[test]
fn test_writer_priority_blocks_late_readers() {
    for policy in [Policy::WriterPriority, Policy::SynchronizedStartWriterPriority] {
        let state = Arc::new(SharedState::new());
        let (tx, rx) = unbounded();

        let early_reader = policy.acquire(Role::Reader, &state);

        let writer = spawn_access(policy, &state, Role::Writer, "writer", Duration::from_millis(20), tx.clone());
        wait_until(|| state.snapshot().pending_writers == 1);

        let late_reader = spawn_access(policy, &state, Role::Reader, "reader", Duration::ZERO, tx.clone());
        wait_until(|| state.snapshot().read_waits >= 1);

        // Nobody enters while the early reader holds access.
        assert!(rx.recv_timeout(Duration::from_millis(20)).is_err());

        drop(early_reader);

        let order: Vec<_> = (0..2).map(|_| rx.recv_timeout(TIMEOUT).unwrap()).collect();
        assert_eq!(order, vec!["writer", "reader"], "{policy}");

        writer.join().unwrap();
        late_reader.join().unwrap();

        let snap = state.snapshot();
        assert_eq!(snap.completed_reads, 2, "{policy}");
        assert_eq!(snap.completed_writes, 1, "{policy}");
        assert_eq!(snap.pending_writers, 0);
    }
}

#[test]
fn test_writer_priority_late_reader_sees_completed_write() {
    let state = Arc::new(SharedState::new());
    let (tx, _rx) = unbounded();
    let early_reader = Policy::WriterPriority.acquire(Role::Reader, &state);

    let writer = spawn_access(
        Policy::WriterPriority,
        &state,
        Role::Writer,
        "writer",
        Duration::from_millis(5),
        tx,
    );
    wait_until(|| state.snapshot().pending_writers == 1);

    let (seen_tx, seen_rx) = unbounded();
    let late = {
        let state = Arc::clone(&state);
        thread::spawn(move || {
            let _access = Policy::WriterPriority.acquire(Role::Reader, &state);
            seen_tx.send(state.snapshot().completed_writes).ok();
        })
    };
    wait_until(|| state.snapshot().read_waits >= 1);

    drop(early_reader);
    assert_eq!(seen_rx.recv_timeout(TIMEOUT).unwrap(), 1);
    writer.join().unwrap();
    late.join().unwrap();
}

#[test]
fn test_reader_priority_admits_late_reader_past_waiting_writer() {
    let policy = Policy::ReaderPriority;
    let state = Arc::new(SharedState::new());
    let (tx, rx) = unbounded();

    let early_reader = policy.acquire(Role::Reader, &state);

    let writer = spawn_access(policy, &state, Role::Writer, "writer", Duration::ZERO, tx.clone());
    wait_until(|| state.snapshot().write_waits >= 1);

    let late_reader = spawn_access(policy, &state, Role::Reader, "reader", Duration::ZERO, tx.clone());

    // The late reader enters while the early reader still holds access.
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "reader");
    late_reader.join().unwrap();
    assert!(rx.try_recv().is_err());

    drop(early_reader);
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "writer");
    writer.join().unwrap();

    let snap = state.snapshot();
    assert_eq!(snap.completed_reads, 2);
    assert_eq!(snap.completed_writes, 1);
    assert_eq!(snap.read_waits, 0);
}

#[test]
fn test_busy_wait_stays_exclusive() {
    let policy = Policy::NoPriorityBusyWait;
    let state = Arc::new(SharedState::new());
    let (tx, rx) = unbounded();

    let writer_access = policy.acquire(Role::Writer, &state);
    let reader = spawn_access(policy, &state, Role::Reader, "reader", Duration::ZERO, tx);

    wait_until(|| state.snapshot().read_waits >= 1);
    assert!(rx.recv_timeout(Duration::from_millis(20)).is_err());

    drop(writer_access);
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "reader");
    reader.join().unwrap();
}
