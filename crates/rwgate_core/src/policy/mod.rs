//! # Admission Policies
//!
//! Readers may share the resource, writers need it alone. The policies differ
//! in who blocks whom while both roles are contending:
//!
//! | Policy                              | Waits on     | Starvation risk        |
//! |-------------------------------------|--------------|------------------------|
//! | `WriterPriority`                    | condvar      | readers                |
//! | `ReaderPriority`                    | gate+condvar | writers                |
//! | `NoPriorityBusyWait`                | spin polling | both (scheduler-bound) |
//! | `SynchronizedStartWriterPriority`   | barrier+cv   | readers                |
//!
//! A release also bumps the role's completion counter under the lock, unless
//! the holder is unwinding from a failed operation. Which of several equally
//! eligible waiters goes first is left to the OS scheduler.

mod busy_wait;
mod reader_priority;
mod writer_priority;

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, Level};

use crate::error::RunError;
use crate::participant::Role;
use crate::state::{AccessState, SharedState};
use crate::startup::{StartGate, StartupBarrier, StartupSync};

pub use busy_wait::NoPriorityBusyWait;
pub use reader_priority::ReaderPriority;
pub use writer_priority::WriterPriority;

/// Acquire/release rules for one admission strategy.
///
/// Implementations are stateless: everything they touch lives in the
/// [`SharedState`] passed in.
pub trait AccessPolicy: Send + Sync {
    /// Blocks until a reader may enter, then registers it.
    fn acquire_read(&self, state: &SharedState);

    /// Unregisters a reader. The read is counted only when `completed`.
    fn release_read(&self, state: &SharedState, completed: bool);

    /// Blocks until a writer may enter, then registers it.
    fn acquire_write(&self, state: &SharedState);

    /// Unregisters the writer. The write is counted only when `completed`.
    fn release_write(&self, state: &SharedState, completed: bool);
}

/// Bookkeeping shared by every `release_read`. Returns the readers left.
#[inline]
pub(crate) fn finish_read(state: &mut AccessState, completed: bool) -> u32 {
    debug_assert!(state.active_readers > 0, "release_read without an active reader");
    state.active_readers -= 1;
    if completed {
        state.completed_reads += 1;
    }
    state.debug_check();
    state.active_readers
}

/// Bookkeeping shared by every `release_write`.
#[inline]
pub(crate) fn finish_write(state: &mut AccessState, completed: bool) {
    debug_assert!(state.writing, "release_write without an active writer");
    state.writing = false;
    if completed {
        state.completed_writes += 1;
    }
    state.debug_check();
}

/// Policy selected once per run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
pub enum Policy {
    /// New readers defer to waiting writers.
    #[default]
    #[serde(rename = "writer-priority", alias = "semaphore")]
    WriterPriority,
    /// Readers never defer to waiting writers; everyone starts behind a gate.
    #[serde(rename = "reader-priority", alias = "mutex-cond")]
    ReaderPriority,
    /// No priority; acquisition spins on the lock.
    #[serde(rename = "busy-wait")]
    NoPriorityBusyWait,
    /// Writer priority behind a startup barrier.
    #[serde(rename = "barrier", alias = "synchronized-start")]
    SynchronizedStartWriterPriority,
}

static WRITER_PRIORITY: WriterPriority = WriterPriority;
static READER_PRIORITY: ReaderPriority = ReaderPriority;
static BUSY_WAIT: NoPriorityBusyWait = NoPriorityBusyWait;

impl Policy {
    /// Every policy, in display order.
    pub const ALL: [Policy; 4] = [
        Policy::WriterPriority,
        Policy::ReaderPriority,
        Policy::NoPriorityBusyWait,
        Policy::SynchronizedStartWriterPriority,
    ];

    /// Stable command line / report name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::WriterPriority => "writer-priority",
            Self::ReaderPriority => "reader-priority",
            Self::NoPriorityBusyWait => "busy-wait",
            Self::SynchronizedStartWriterPriority => "barrier",
        }
    }

    /// The acquire/release rules behind this policy.
    #[must_use]
    pub fn strategy(self) -> &'static dyn AccessPolicy {
        match self {
            Self::WriterPriority | Self::SynchronizedStartWriterPriority => &WRITER_PRIORITY,
            Self::ReaderPriority => &READER_PRIORITY,
            Self::NoPriorityBusyWait => &BUSY_WAIT,
        }
    }

    /// Builds the startup synchronization this policy needs for `participants`.
    #[must_use]
    pub fn startup_sync(self, participants: usize) -> StartupSync {
        match self {
            Self::WriterPriority | Self::NoPriorityBusyWait => StartupSync::Immediate,
            Self::ReaderPriority => StartupSync::Gate(StartGate::new()),
            Self::SynchronizedStartWriterPriority => {
                StartupSync::Barrier(StartupBarrier::new(participants))
            }
        }
    }

    /// Whether newly arriving readers wait behind pending writers.
    #[must_use]
    pub const fn prefers_writers(self) -> bool {
        matches!(
            self,
            Self::WriterPriority | Self::SynchronizedStartWriterPriority
        )
    }

    /// Acquires access for `role` and returns a guard that releases on drop.
    pub fn acquire(self, role: Role, state: &SharedState) -> AccessGuard<'_> {
        let strategy = self.strategy();
        match role {
            Role::Reader => strategy.acquire_read(state),
            Role::Writer => strategy.acquire_write(state),
        }
        log_transition(state, role, "access granted");
        AccessGuard {
            strategy,
            state,
            role,
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Policy {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "writer-priority" | "semaphore" => Ok(Self::WriterPriority),
            "reader-priority" | "mutex-cond" => Ok(Self::ReaderPriority),
            "busy-wait" => Ok(Self::NoPriorityBusyWait),
            "barrier" | "synchronized-start" => Ok(Self::SynchronizedStartWriterPriority),
            other => Err(RunError::InvalidConfiguration(format!(
                "unknown policy `{other}`, expected one of: writer-priority, reader-priority, busy-wait, barrier"
            ))),
        }
    }
}

/// Emits the state right after an admit or release. The extra lock is only
/// taken when DEBUG is enabled.
fn log_transition(state: &SharedState, role: Role, event: &'static str) {
    if tracing::enabled!(Level::DEBUG) {
        let snap = state.snapshot();
        debug!(
            %role,
            active_readers = snap.active_readers,
            pending_writers = snap.pending_writers,
            writing = snap.writing,
            "{event}"
        );
    }
}

/// Held while a participant has access. Dropping it releases access on every
/// path. The operation is counted as completed unless the thread is
/// unwinding.
#[must_use = "access is released as soon as the guard is dropped"]
pub struct AccessGuard<'a> {
    strategy: &'static dyn AccessPolicy,
    state: &'a SharedState,
    role: Role,
}

impl AccessGuard<'_> {
    /// Role this guard was acquired for.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }
}

impl fmt::Debug for AccessGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGuard").field("role", &self.role).finish()
    }
}

impl Drop for AccessGuard<'_> {
    fn drop(&mut self) {
        let completed = !std::thread::panicking();
        match self.role {
            Role::Reader => self.strategy.release_read(self.state, completed),
            Role::Writer => self.strategy.release_write(self.state, completed),
        }
        log_transition(
            self.state,
            self.role,
            if completed { "access released" } else { "access abandoned" },
        );
    }
}
