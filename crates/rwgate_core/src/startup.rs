//! # Startup Synchronization
//!
//! Two ways of making every participant start contending at the same time:
//!
//! - [`StartGate`]: one-shot flag opened by the coordinator once every
//!   participant thread exists.
//! - [`StartupBarrier`]: rendezvous that releases everyone when the last of
//!   `parties` participants arrives.
//!
//! Both can be cancelled. A cancelled wait returns [`StartSignal::Abort`] so
//! participants of a run that failed to spawn completely leave without ever
//! touching the shared state.

use parking_lot::{Condvar, Mutex};

/// Outcome of a startup wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartSignal {
    /// Proceed to contend for the resource.
    Go,
    /// The run was torn down before it started.
    Abort,
}

#[derive(Debug, Default)]
struct GateState {
    open: bool,
    cancelled: bool,
}

/// One-shot start gate.
#[derive(Debug, Default)]
pub struct StartGate {
    state: Mutex<GateState>,
    opened: Condvar,
}

impl StartGate {
    /// Creates a closed gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the gate is opened or cancelled.
    pub fn wait(&self) -> StartSignal {
        let mut state = self.state.lock();
        while !state.open && !state.cancelled {
            self.opened.wait(&mut state);
        }
        if state.cancelled {
            StartSignal::Abort
        } else {
            StartSignal::Go
        }
    }

    /// Opens the gate and wakes every waiter. Later waits return immediately.
    pub fn open(&self) {
        self.state.lock().open = true;
        self.opened.notify_all();
    }

    /// Cancels the gate. Waiters and later callers get [`StartSignal::Abort`].
    pub fn cancel(&self) {
        self.state.lock().cancelled = true;
        self.opened.notify_all();
    }

    /// Returns whether the gate has been opened.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }
}

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    released: bool,
    cancelled: bool,
}

/// Single-use rendezvous for a fixed number of parties.
#[derive(Debug)]
pub struct StartupBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl StartupBarrier {
    /// Creates a barrier for `parties` participants.
    ///
    /// # Panics
    ///
    /// Panics if `parties` is zero.
    #[must_use]
    pub fn new(parties: usize) -> Self {
        assert!(parties > 0, "barrier needs at least one party");
        Self {
            parties,
            state: Mutex::new(BarrierState {
                arrived: 0,
                released: false,
                cancelled: false,
            }),
            released: Condvar::new(),
        }
    }

    /// Number of parties the barrier waits for.
    #[must_use]
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Number of parties that have arrived so far.
    #[must_use]
    pub fn arrived(&self) -> usize {
        self.state.lock().arrived
    }

    /// Arrives at the barrier and blocks until every party has arrived.
    pub fn wait(&self) -> StartSignal {
        let mut state = self.state.lock();
        if state.cancelled {
            return StartSignal::Abort;
        }

        state.arrived += 1;
        if state.arrived >= self.parties {
            state.released = true;
            drop(state);
            self.released.notify_all();
            return StartSignal::Go;
        }

        while !state.released && !state.cancelled {
            self.released.wait(&mut state);
        }
        if state.released {
            StartSignal::Go
        } else {
            StartSignal::Abort
        }
    }

    /// Cancels the barrier. Current and future waiters get [`StartSignal::Abort`]
    /// unless the barrier already released.
    pub fn cancel(&self) {
        self.state.lock().cancelled = true;
        self.released.notify_all();
    }
}

/// Startup synchronization attached to a run.
#[derive(Debug)]
pub enum StartupSync {
    /// Participants start contending as soon as they are spawned.
    Immediate,
    /// Participants wait for the coordinator to open the gate.
    Gate(StartGate),
    /// Participants wait for each other.
    Barrier(StartupBarrier),
}

impl StartupSync {
    /// Waits according to the variant.
    pub fn wait(&self) -> StartSignal {
        match self {
            Self::Immediate => StartSignal::Go,
            Self::Gate(gate) => gate.wait(),
            Self::Barrier(barrier) => barrier.wait(),
        }
    }

    /// Called by the coordinator after the last participant was spawned.
    pub fn all_spawned(&self) {
        if let Self::Gate(gate) = self {
            gate.open();
        }
    }

    /// Called by the coordinator when spawning failed part way through.
    pub fn cancel(&self) {
        match self {
            Self::Immediate => {}
            Self::Gate(gate) => gate.cancel(),
            Self::Barrier(barrier) => barrier.cancel(),
        }
    }
}
