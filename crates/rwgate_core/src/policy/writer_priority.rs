//! Writer-priority admission.
//!
//! A writer registers as pending before it waits. Readers refuse to enter
//! while any writer is pending or writing, so once a writer is queued no new
//! reader can overtake it. Readers may starve under a steady stream of writers.

use tracing::trace;

use super::{finish_read, finish_write, AccessPolicy};
use crate::participant::Role;
use crate::state::SharedState;

/// Writers first: new readers wait behind pending writers.
#[derive(Clone, Copy, Debug, Default)]
pub struct WriterPriority;

impl AccessPolicy for WriterPriority {
    fn acquire_read(&self, state: &SharedState) {
        let mut guard = state.lock();
        state.wait_while(&mut guard, Role::Reader, |s| s.writing || s.pending_writers > 0);
        guard.active_readers += 1;
        guard.debug_check();
    }

    fn release_read(&self, state: &SharedState, completed: bool) {
        let mut guard = state.lock();
        if finish_read(&mut guard, completed) == 0 {
            drop(guard);
            state.notify_all();
        }
    }

    fn acquire_write(&self, state: &SharedState) {
        let mut guard = state.lock();
        guard.pending_writers += 1;
        trace!(pending = guard.pending_writers, "writer registered");
        state.wait_while(&mut guard, Role::Writer, |s| s.writing || s.active_readers > 0);
        guard.pending_writers -= 1;
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..2000 {
            if cond() {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_readers_share() {
        let state = SharedState::new();
        WriterPriority.acquire_read(&state);
        WriterPriority.acquire_read(&state);
        assert_eq!(state.snapshot().active_readers, 2);
        WriterPriority.release_read(&state, true);
        WriterPriority.release_read(&state, true);
        assert_eq!(state.snapshot().completed_reads, 2);
    }

    #[test]
    fn test_pending_writer_blocks_new_reader() {
        let state = Arc::new(SharedState::new());
        WriterPriority.acquire_read(&state);

        let writer = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                WriterPriority.acquire_write(&state);
                WriterPriority.release_write(&state, true);
            })
        };
        wait_for(|| state.snapshot().pending_writers == 1);

        let late_reader = {
            let state = Arc::clone(&state);
            thread::spawn(move || {
                WriterPriority.acquire_read(&state);
                let writes_seen = state.snapshot().completed_writes;
                WriterPriority.release_read(&state, true);
                writes_seen
            })
        };
        wait_for(|| state.snapshot().read_waits >= 1);
        assert_eq!(state.snapshot().active_readers, 1);

        WriterPriority.release_read(&state, true);
        writer.join().unwrap();
        assert_eq!(late_reader.join().unwrap(), 1);

        let snap = state.snapshot();
        assert_eq!(snap.completed_reads, 2);
        assert_eq!(snap.completed_writes, 1);
        assert_eq!(snap.pending_writers, 0);
    }
}
