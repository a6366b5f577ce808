//! # Shared Access State
//!
//! The counters and flags every participant mutates, guarded by a single
//! `parking_lot::Mutex` and one `Condvar`.
//!
//! ```text
//!   Reader 0 ──┐                    ┌──────────────────────────┐
//!   Reader 1 ──┼── lock() ────────▶ │ AccessState              │
//!   Writer 0 ──┘      ▲             │  active_readers          │
//!                     │             │  pending_writers         │
//!             changed.wait()        │  writing                 │
//!      (releases + reacquires)      │  completed_reads/writes  │
//!                                   └──────────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! At every point where the lock is not held:
//! - `writing` implies `active_readers == 0`
//! - at most one writer holds `writing`
//! - completion counters never decrease

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::participant::Role;

/// The protected fields. Only reachable through [`SharedState::lock`].
#[derive(Debug, Default)]
pub(crate) struct AccessState {
    pub(crate) active_readers: u32,
    pub(crate) pending_writers: u32,
    pub(crate) writing: bool,
    pub(crate) completed_reads: u64,
    pub(crate) completed_writes: u64,
    pub(crate) read_waits: u64,
    pub(crate) write_waits: u64,
}

impl AccessState {
    /// Records one blocked wait or failed poll for `role`.
    #[inline]
    pub(crate) fn count_wait(&mut self, role: Role) {
        match role {
            Role::Reader => self.read_waits += 1,
            Role::Writer => self.write_waits += 1,
        }
    }

    /// Asserts the exclusion invariants (debug builds only).
    #[inline]
    pub(crate) fn debug_check(&self) {
        debug_assert!(
            !(self.writing && self.active_readers > 0),
            "writer active alongside {} readers",
            self.active_readers
        );
    }

    fn snapshot(&self) -> AccessSnapshot {
        AccessSnapshot {
            active_readers: self.active_readers,
            pending_writers: self.pending_writers,
            writing: self.writing,
            completed_reads: self.completed_reads,
            completed_writes: self.completed_writes,
            read_waits: self.read_waits,
            write_waits: self.write_waits,
        }
    }
}

/// Point-in-time copy of the shared counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccessSnapshot {
    /// Readers currently inside the resource.
    pub active_readers: u32,
    /// Writers registered and waiting to write.
    pub pending_writers: u32,
    /// Whether a writer currently holds the resource.
    pub writing: bool,
    /// Finished read operations.
    pub completed_reads: u64,
    /// Finished write operations.
    pub completed_writes: u64,
    /// Times a reader had to wait or failed a poll.
    pub read_waits: u64,
    /// Times a writer had to wait or failed a poll.
    pub write_waits: u64,
}

/// State shared by every participant of one run.
#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<AccessState>,
    changed: Condvar,
}

impl SharedState {
    /// Creates an idle state with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state.
    #[inline]
    pub(crate) fn lock(&self) -> MutexGuard<'_, AccessState> {
        self.inner.lock()
    }

    /// Blocks while `blocked` holds, counting each wait against `role`.
    ///
    /// The condition wait releases and reacquires the lock atomically, so a
    /// notification sent between the check and the wait cannot be lost.
    pub(crate) fn wait_while<F>(&self, guard: &mut MutexGuard<'_, AccessState>, role: Role, mut blocked: F)
    where
        F: FnMut(&AccessState) -> bool,
    {
        while blocked(&**guard) {
            guard.count_wait(role);
            self.changed.wait(guard);
        }
    }

    /// Wakes every waiter.
    #[inline]
    pub(crate) fn notify_all(&self) {
        self.changed.notify_all();
    }

    /// Wakes one waiter.
    #[inline]
    pub(crate) fn notify_one(&self) {
        self.changed.notify_one();
    }

    /// Returns a consistent copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> AccessSnapshot {
        self.inner.lock().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_new_state_is_idle() {
        let state = SharedState::new();
        assert_eq!(state.snapshot(), AccessSnapshot::default());
    }

    #[test]
    fn test_wait_while_counts_waits() {
        let state = Arc::new(SharedState::new());
        state.lock().writing = true;

        let waiter = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                let mut guard = state.lock();
                state.wait_while(&mut guard, Role::Reader, |s| s.writing);
                guard.active_readers += 1;
            })
        };

        while state.snapshot().read_waits == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        {
            let mut guard = state.lock();
            guard.writing = false;
        }
        state.notify_all();
        waiter.join().unwrap();

        let snap = state.snapshot();
        assert_eq!(snap.active_readers, 1);
        assert!(snap.read_waits >= 1);
        assert_eq!(snap.write_waits, 0);
    }

    #[test]
    fn test_wait_while_returns_immediately_when_clear() {
        let state = SharedState::new();
        let mut guard = state.lock();
        state.wait_while(&mut guard, Role::Writer, |s| s.writing);
        assert_eq!(guard.write_waits, 0);
    }
}
