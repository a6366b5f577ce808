//! # Participants
//!
//! A participant is one reader or writer task. The coordinator creates it,
//! moves it into its own thread and drops it when [`ParticipantRunner::run`]
//! returns.
//!
//! ## Task Body
//!
//! ```text
//!   startup wait ──▶ acquire ──▶ operation (lock NOT held) ──▶ release
//!        │                                                      ▲
//!        └─ Abort: leave without touching the state             │
//!                            guard drop (also on unwind) ───────┘
//! ```

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::metrics::AccessTimeline;
use crate::policy::Policy;
use crate::startup::{StartSignal, StartupSync};
use crate::state::SharedState;

/// Which side of the reader-writer problem a participant is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Shares the resource with other readers.
    Reader,
    /// Needs the resource exclusively.
    Writer,
}

impl Role {
    /// Capitalized label used in the lifecycle trace.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Reader => "Reader",
            Self::Writer => "Writer",
        }
    }

    const fn verb(self) -> &'static str {
        match self {
            Self::Reader => "reading",
            Self::Writer => "writing",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reader => "reader",
            Self::Writer => "writer",
        })
    }
}

/// One reader or writer task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Participant {
    /// Reader or writer.
    pub role: Role,
    /// Zero-based index within its role.
    pub id: usize,
    /// Length of the simulated operation in time units.
    pub operation_units: u32,
}

impl Participant {
    /// Wall-clock length of the simulated operation.
    #[must_use]
    pub fn operation_duration(&self, time_unit: Duration) -> Duration {
        time_unit * self.operation_units
    }
}

/// The work a participant performs while it holds access.
pub trait Operation: Send + Sync {
    /// Performs the operation. Called with access held but the state lock free.
    fn perform(&self, participant: &Participant);
}

/// Stand-in for I/O: sleeps for `operation_units` time units.
#[derive(Clone, Copy, Debug)]
pub struct SimulatedIo {
    /// Length of one time unit.
    pub time_unit: Duration,
}

impl Operation for SimulatedIo {
    fn perform(&self, participant: &Participant) {
        thread::sleep(participant.operation_duration(self.time_unit));
    }
}

/// How a participant's task body ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParticipantOutcome {
    /// Acquired, operated, released.
    Completed,
    /// The startup sync was cancelled; the participant never contended.
    Aborted,
}

/// Everything a participant thread needs, cloned once per participant.
#[derive(Clone)]
pub struct ParticipantRunner {
    pub(crate) policy: Policy,
    pub(crate) state: Arc<SharedState>,
    pub(crate) startup: Arc<StartupSync>,
    pub(crate) operation: Arc<dyn Operation>,
    pub(crate) timeline: Option<Arc<AccessTimeline>>,
}

impl ParticipantRunner {
    /// Creates a runner with no startup sync and no timeline.
    #[must_use]
    pub fn new(policy: Policy, state: Arc<SharedState>, operation: Arc<dyn Operation>) -> Self {
        Self {
            policy,
            state,
            startup: Arc::new(StartupSync::Immediate),
            operation,
            timeline: None,
        }
    }

    /// Runs the task body for `participant`.
    pub fn run(&self, participant: Participant) -> ParticipantOutcome {
        let Participant { role, id, .. } = participant;

        if self.startup.wait() == StartSignal::Abort {
            debug!(%role, id, "startup cancelled, leaving");
            return ParticipantOutcome::Aborted;
        }

        let access = self.policy.acquire(role, &self.state);
        let started = Instant::now();
        info!("{} [{}] is {}...", role.label(), id, role.verb());

        self.operation.perform(&participant);

        info!("{} [{}] stop {}.", role.label(), id, role.verb());
        if let Some(timeline) = &self.timeline {
            timeline.record(role, id, started, Instant::now());
        }
        drop(access);

        ParticipantOutcome::Completed
    }
}

impl fmt::Debug for ParticipantRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticipantRunner")
            .field("policy", &self.policy)
            .field("recording", &self.timeline.is_some())
            .finish_non_exhaustive()
    }
}
