//! # Run Coordinator
//!
//! Creates the shared state and startup sync, spawns one OS thread per
//! participant in a randomized reader/writer order, joins them all and
//! hands the final counters to the [`MetricsCollector`].
//!
//! ```text
//!   validate ──▶ timer start ──▶ spawn ×N ──▶ open gate ──▶ join ×N ──▶ report
//!                                   │
//!                                   └─ spawn error: cancel startup, join, fail
//! ```
//!
//! The coordinator never touches the shared state while participants run.
//! Joins have no timeout: a participant that never finishes hangs the run.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, warn};

use crate::config::RunConfig;
use crate::error::{RunError, RunResult};
use crate::metrics::{AccessTimeline, MetricsCollector, RunReport};
use crate::participant::{Operation, Participant, ParticipantOutcome, ParticipantRunner, Role, SimulatedIo};
use crate::state::SharedState;

/// Decides the creation order of participants.
///
/// Each slot is a reader when readers remain and either no writers remain or a
/// fair coin says so; otherwise it is a writer. The result always contains
/// exactly `num_readers` readers and `num_writers` writers.
pub fn plan_roles<R: Rng + ?Sized>(num_readers: usize, num_writers: usize, rng: &mut R) -> Vec<Role> {
    let mut readers_left = num_readers;
    let mut writers_left = num_writers;
    let mut plan = Vec::with_capacity(num_readers + num_writers);

    while readers_left + writers_left > 0 {
        if readers_left > 0 && (writers_left == 0 || rng.gen_bool(0.5)) {
            plan.push(Role::Reader);
            readers_left -= 1;
        } else {
            plan.push(Role::Writer);
            writers_left -= 1;
        }
    }
    plan
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() ^ u64::from(d.subsec_nanos()).rotate_left(32))
}

type SpawnedParticipant = (Role, usize, JoinHandle<ParticipantOutcome>);
type ParticipantTask = Box<dyn FnOnce() -> ParticipantOutcome + Send + 'static>;
type SpawnFn = dyn Fn(String, ParticipantTask) -> io::Result<JoinHandle<ParticipantOutcome>> + Send + Sync;

/// Starts one participant on a named OS thread.
fn spawn_named(name: String, task: ParticipantTask) -> io::Result<JoinHandle<ParticipantOutcome>> {
    thread::Builder::new().name(name).spawn(task)
}

/// Runs one configured reader-writer workload.
pub struct RunCoordinator {
    config: RunConfig,
    operation: Arc<dyn Operation>,
    spawn: Box<SpawnFn>,
}

impl RunCoordinator {
    /// Creates a coordinator whose participants sleep for their operation.
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        let operation = Arc::new(SimulatedIo {
            time_unit: config.workload().time_unit,
        });
        Self::with_operation(config, operation)
    }

    /// Creates a coordinator with a custom operation.
    #[must_use]
    pub fn with_operation(config: RunConfig, operation: Arc<dyn Operation>) -> Self {
        Self {
            config,
            operation,
            spawn: Box::new(spawn_named),
        }
    }

    #[cfg(test)]
    fn with_spawner<F>(mut self, spawn: F) -> Self
    where
        F: Fn(String, ParticipantTask) -> io::Result<JoinHandle<ParticipantOutcome>> + Send + Sync + 'static,
    {
        self.spawn = Box::new(spawn);
        self
    }

    /// The run's configuration.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Executes the run and blocks until every participant has returned.
    ///
    /// # Errors
    ///
    /// - Configuration errors, before anything is created.
    /// - [`RunError::ResourceInitialization`] if the handle table cannot be
    ///   allocated or a thread cannot be spawned.
    /// - [`RunError::ParticipantPanicked`] if any participant panicked.
    pub fn run(&self) -> RunResult<RunReport> {
        self.config.validate()?;

        let policy = self.config.policy();
        let workload = *self.config.workload();
        let total = self.config.participants();
        let seed = workload.seed.unwrap_or_else(clock_seed);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut handles: Vec<SpawnedParticipant> = Vec::new();
        handles
            .try_reserve_exact(total)
            .map_err(|e| RunError::ResourceInitialization {
                what: format!("handle table for {total} participants"),
                reason: e.to_string(),
            })?;

        let runner = ParticipantRunner {
            policy,
            state: Arc::new(SharedState::new()),
            startup: Arc::new(policy.startup_sync(total)),
            operation: Arc::clone(&self.operation),
            timeline: self
                .config
                .records_timeline()
                .then(|| Arc::new(AccessTimeline::new())),
        };

        info!(
            %policy,
            readers = self.config.num_readers(),
            writers = self.config.num_writers(),
            seed,
            "starting run"
        );

        let metrics = MetricsCollector::start();
        let plan = plan_roles(self.config.num_readers(), self.config.num_writers(), &mut rng);
        let mut next_reader = 0;
        let mut next_writer = 0;

        for role in plan {
            let next = match role {
                Role::Reader => &mut next_reader,
                Role::Writer => &mut next_writer,
            };
            let id = *next;
            *next += 1;

            let participant = Participant {
                role,
                id,
                operation_units: rng.gen_range(workload.min_units..=workload.max_units),
            };
            let task_runner = runner.clone();
            let task: ParticipantTask = Box::new(move || task_runner.run(participant));
            let spawned = (self.spawn)(format!("{role}-{id}"), task);

            match spawned {
                Ok(handle) => handles.push((role, id, handle)),
                Err(e) => {
                    error!(%role, id, error = %e, "failed to spawn participant, aborting run");
                    runner.startup.cancel();
                    if let Err(join_err) = Self::join_all(handles) {
                        warn!(error = %join_err, "participant failed during teardown");
                    }
                    return Err(RunError::ResourceInitialization {
                        what: format!("thread for {role} {id}"),
                        reason: e.to_string(),
                    });
                }
            }
        }

        runner.startup.all_spawned();
        debug!(participants = total, "all participants spawned");

        Self::join_all(handles)?;

        let timeline = runner.timeline.as_ref().map(|t| t.intervals());
        let report = metrics.finish(&self.config, seed, runner.state.snapshot(), timeline);
        info!(
            reads = report.completed_reads,
            writes = report.completed_writes,
            elapsed_secs = report.elapsed_seconds,
            "run finished"
        );
        Ok(report)
    }

    /// Joins every handle, reporting the first panicked participant.
    fn join_all(handles: Vec<SpawnedParticipant>) -> RunResult<()> {
        let mut failure = None;
        for (role, id, handle) in handles {
            match handle.join() {
                Ok(ParticipantOutcome::Completed) => {}
                Ok(ParticipantOutcome::Aborted) => debug!(%role, id, "participant aborted"),
                Err(_) => {
                    warn!(%role, id, "participant panicked");
                    failure.get_or_insert(RunError::ParticipantPanicked { role, id });
                }
            }
        }
        failure.map_or(Ok(()), Err)
    }
}

/// Runs `config` with the default simulated operation.
///
/// # Errors
///
/// See [`RunCoordinator::run`].
pub fn run(config: RunConfig) -> RunResult<RunReport> {
    RunCoordinator::new(config).run()
}
