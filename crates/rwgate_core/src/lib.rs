//! # RWGATE Core
//!
//! Configurable reader-writer access coordinator. Serializes concurrent
//! "read" and "write" operations on one logical resource under one of four
//! admission policies, counts completed operations and measures throughput.
//!
//! ## Architecture Rules
//!
//! 1. **One lock** - every counter lives behind a single mutex
//! 2. **No I/O under the lock** - the simulated operation runs with the lock released
//! 3. **Guaranteed release** - access is an RAII guard, released on every exit path
//!
//! ## Example
//!
//! ```rust,no_run
//! use rwgate_core::{run, Policy, RunConfig, WorkloadConfig};
//!
//! let config = RunConfig::new(3, 2, Policy::WriterPriority)?
//!     .with_workload(WorkloadConfig::quick(10, 42));
//! let report = run(config)?;
//! assert_eq!(report.completed_reads, 3);
//! # Ok::<(), rwgate_core::RunError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod coordinator;
pub mod cpu;
pub mod error;
pub mod metrics;
pub mod participant;
pub mod policy;
pub mod startup;
pub mod state;

pub use config::{RunConfig, RunSettings, WorkloadConfig};
pub use coordinator::{plan_roles, run, RunCoordinator};
pub use cpu::process_cpu_time;
pub use error::{RunError, RunResult};
pub use metrics::{check_exclusion, AccessInterval, AccessTimeline, MetricsCollector, Overlap, RunReport};
pub use participant::{Operation, Participant, ParticipantOutcome, ParticipantRunner, Role, SimulatedIo};
pub use policy::{AccessGuard, AccessPolicy, Policy};
pub use startup::{StartGate, StartSignal, StartupBarrier, StartupSync};
pub use state::{AccessSnapshot, SharedState};
