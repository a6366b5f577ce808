//! No-priority busy-wait admission.
//!
//! There is no condition variable. Acquisition locks, tests the predicate,
//! and either updates the state inside that same critical section or unlocks
//! and polls again. Progress depends on scheduler fairness, so either role can
//! starve, and spinning threads burn a full core each.

use super::{finish_read, finish_write, AccessPolicy};
use crate::participant::Role;
use crate::state::{AccessState, SharedState};

/// No priority: both roles spin on the lock.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPriorityBusyWait;

impl NoPriorityBusyWait {
    /// Polls until `admit` succeeds on a locked state.
    fn spin_until<F>(state: &SharedState, role: Role, mut admit: F)
    where
        F: FnMut(&mut AccessState) -> bool,
    {
        loop {
            {
                let mut guard = state.lock();
                if admit(&mut *guard) {
                    guard.debug_check();
                    return;
                }
                guard.count_wait(role);
            }
            std::hint::spin_loop();
        }
    }
}

impl AccessPolicy for NoPriorityBusyWait {
    fn acquire_read(&self, state: &SharedState) {
        Self::spin_until(state, Role::Reader, |s| {
            if s.writing {
                return false;
            }
            s.active_readers += 1;
            true
        });
    }

    fn release_read(&self, state: &SharedState, completed: bool) {
        finish_read(&mut state.lock(), completed);
    }

    fn acquire_write(&self, state: &SharedState) {
        Self::spin_until(state, Role::Writer, |s| {
            if s.writing || s.active_readers > 0 {
                return false;
            }
            s.writing = true;
            true
        });
    }

    fn release_write(&self, state: &SharedState, completed: bool) {
        finish_write(&mut state.lock(), completed);
    }
}
