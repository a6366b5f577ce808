//! Reader-priority admission.
//!
//! Readers only wait for an active writer; a queued writer never holds them
//! back. Writers wait until no reader is inside, and may starve while readers
//! keep arriving.

use super::{finish_read, finish_write, AccessPolicy};
use crate::participant::Role;
use crate::state::SharedState;

/// Readers first: a waiting writer never blocks an arriving reader.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReaderPriority;

impl AccessPolicy for ReaderPriority {
    fn acquire_read(&self, state: &SharedState) {
        let mut guard = state.lock();
        state.wait_while(&mut guard, Role::Reader, |s| s.writing);
        guard.active_readers += 1;
        guard.debug_check();
    }

    fn release_read(&self, state: &SharedState, completed: bool) {
        let mut guard = state.lock();
        // Readers never wait while other readers are inside, so the only
        // useful wakeup here is a writer.
        if finish_read(&mut guard, completed) == 0 {
            drop(guard);
            state.notify_one();
        }
    }

    fn acquire_write(&self, state: &SharedState) {
        let mut guard = state.lock();
        state.wait_while(&mut guard, Role::Writer, |s| s.writing || s.active_readers > 0);
        guard.writing = true;
        guard.debug_check();
    }

    fn release_write(&self, state: &SharedState, completed: bool) {
        let mut guard = state.lock();
        finish_write(&mut guard, completed);
        drop(guard);
        state.notify_all();
    }
}
