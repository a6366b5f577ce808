//! # Run Metrics
//!
//! Elapsed time, completion counts and throughput for one run, plus an
//! optional access timeline used to check mutual exclusion after the fact.
//!
//! ## Summary CSV
//!
//! ```text
//! implementation,scenario,num_readers,num_writers,reads_completed,writes_completed,
//! program_exec_time_sec,read_throughput_ops_sec,write_throughput_ops_sec,total_throughput_ops_sec,
//! perf_cpu_cycles,perf_task_clock_ms
//! ```
//!
//! One row per run, appended. The header is written when the file is empty.
//! The `perf_*` cells use `perf stat` text (`"1234.56 msec"`); hardware
//! cycles are not counted and always read `<not supported> cycles`.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::RunConfig;
use crate::cpu;
use crate::error::{RunError, RunResult};
use crate::participant::Role;
use crate::policy::Policy;
use crate::state::AccessSnapshot;

/// Header line of the summary CSV.
pub const SUMMARY_CSV_HEADER: &str = "implementation,scenario,num_readers,num_writers,reads_completed,writes_completed,program_exec_time_sec,read_throughput_ops_sec,write_throughput_ops_sec,total_throughput_ops_sec,perf_cpu_cycles,perf_task_clock_ms";

const CYCLES_NOT_COUNTED: &str = "<not supported> cycles";

/// One operation's time inside the resource, relative to the timeline epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessInterval {
    /// Role of the participant.
    pub role: Role,
    /// Participant id within its role.
    pub id: usize,
    /// Offset at which the operation started.
    pub start: Duration,
    /// Offset at which the operation ended.
    pub end: Duration,
}

impl AccessInterval {
    /// Whether the two intervals share any instant (touching ends do not count).
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Two intervals that must not have overlapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Overlap {
    /// The earlier-starting interval.
    pub first: AccessInterval,
    /// The interval that started inside `first`.
    pub second: AccessInterval,
}

impl fmt::Display for Overlap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{:?}, {:?}) overlaps {} {} [{:?}, {:?})",
            self.first.role,
            self.first.id,
            self.first.start,
            self.first.end,
            self.second.role,
            self.second.id,
            self.second.start,
            self.second.end
        )
    }
}

/// Checks that no writer interval overlaps any other interval.
///
/// # Errors
///
/// Returns the first overlapping pair found, ordered by start time.
pub fn check_exclusion(intervals: &[AccessInterval]) -> Result<(), Overlap> {
    let mut sorted = intervals.to_vec();
    sorted.sort_by_key(|i| i.start);

    for (idx, first) in sorted.iter().enumerate() {
        for second in sorted[idx + 1..].iter().take_while(|s| s.start < first.end) {
            let involves_writer = first.role == Role::Writer || second.role == Role::Writer;
            if involves_writer && first.overlaps(second) {
                return Err(Overlap {
                    first: *first,
                    second: *second,
                });
            }
        }
    }
    Ok(())
}

/// Thread-safe log of access intervals.
#[derive(Debug)]
pub struct AccessTimeline {
    epoch: Instant,
    intervals: Mutex<Vec<AccessInterval>>,
}

impl AccessTimeline {
    /// Creates an empty timeline whose epoch is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            intervals: Mutex::new(Vec::new()),
        }
    }

    /// Records an operation that ran from `start` to `end`.
    pub fn record(&self, role: Role, id: usize, start: Instant, end: Instant) {
        let interval = AccessInterval {
            role,
            id,
            start: start.saturating_duration_since(self.epoch),
            end: end.saturating_duration_since(self.epoch),
        };
        self.intervals.lock().push(interval);
    }

    /// Copy of every recorded interval, in recording order.
    #[must_use]
    pub fn intervals(&self) -> Vec<AccessInterval> {
        self.intervals.lock().clone()
    }
}

impl Default for AccessTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Final figures of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// Policy the run used.
    pub policy: Policy,
    /// Seed of the role plan and durations.
    pub seed: u64,
    /// Requested readers.
    pub num_readers: usize,
    /// Requested writers.
    pub num_writers: usize,
    /// Reads that finished.
    pub completed_reads: u64,
    /// Writes that finished.
    pub completed_writes: u64,
    /// Times readers blocked or failed a poll.
    pub read_waits: u64,
    /// Times writers blocked or failed a poll.
    pub write_waits: u64,
    /// Wall time from before the first spawn to after the last join.
    pub elapsed: Duration,
    /// `elapsed` in seconds.
    pub elapsed_seconds: f64,
    /// Reads per second.
    pub read_throughput: f64,
    /// Writes per second.
    pub write_throughput: f64,
    /// All operations per second.
    pub total_throughput: f64,
    /// Process CPU time (user + system) over the run, where the platform
    /// reports it.
    pub cpu_time: Option<Duration>,
    /// Recorded intervals, when timeline recording was on.
    pub timeline: Option<Vec<AccessInterval>>,
}

#[allow(clippy::cast_precision_loss)]
fn per_second(count: u64, seconds: f64) -> f64 {
    if seconds > 0.0 {
        count as f64 / seconds
    } else {
        0.0
    }
}

impl RunReport {
    /// Total finished operations.
    #[must_use]
    pub fn total_operations(&self) -> u64 {
        self.completed_reads + self.completed_writes
    }

    /// Checks the recorded timeline, if any, for exclusion violations.
    ///
    /// # Errors
    ///
    /// Returns the first overlap found.
    pub fn verify_exclusion(&self) -> Result<(), Overlap> {
        self.timeline.as_deref().map_or(Ok(()), check_exclusion)
    }

    /// `cpu_time` as a `perf stat` task-clock cell.
    fn task_clock_cell(&self) -> String {
        self.cpu_time.map_or_else(
            || "<not supported> msec".to_owned(),
            |cpu| format!("{:.2} msec", cpu.as_secs_f64() * 1000.0),
        )
    }

    /// Formats this run as one summary CSV row (no trailing newline).
    #[must_use]
    pub fn summary_row(&self, scenario: &str) -> String {
        let scenario = scenario.replace([',', '\n', '\r'], " ");
        format!(
            "{},{},{},{},{},{},{:.4},{:.2},{:.2},{:.2},{},{}",
            self.policy.name(),
            scenario,
            self.num_readers,
            self.num_writers,
            self.completed_reads,
            self.completed_writes,
            self.elapsed_seconds,
            self.read_throughput,
            self.write_throughput,
            self.total_throughput,
            CYCLES_NOT_COUNTED,
            self.task_clock_cell()
        )
    }

    /// Appends this run to the summary CSV at `path`, writing the header if the
    /// file is new or empty. Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Report`] on any I/O failure.
    pub fn append_summary_csv(&self, path: &Path, scenario: &str) -> RunResult<()> {
        let report_err = |e: std::io::Error| RunError::Report(format!("{}: {e}", path.display()));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(report_err)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(report_err)?;

        let is_empty = file.metadata().map_err(report_err)?.len() == 0;
        if is_empty {
            writeln!(file, "{SUMMARY_CSV_HEADER}").map_err(report_err)?;
        }
        writeln!(file, "{}", self.summary_row(scenario)).map_err(report_err)?;
        file.flush().map_err(report_err)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Readers finished: {}", self.completed_reads)?;
        writeln!(f, "Writers finished: {}", self.completed_writes)?;
        writeln!(f, "Total execution time: {:.4} seconds", self.elapsed_seconds)?;
        if let Some(cpu) = self.cpu_time {
            writeln!(f, "CPU time: {:.2} ms", cpu.as_secs_f64() * 1000.0)?;
        }
        writeln!(f, "Readers Throughput: {:.2} ops/sec", self.read_throughput)?;
        writeln!(f, "Writers Throughput: {:.2} ops/sec", self.write_throughput)?;
        write!(f, "Total Throughput: {:.2} ops/sec", self.total_throughput)
    }
}

/// Times a run and turns the final counters into a [`RunReport`].
#[derive(Debug, Clone, Copy)]
pub struct MetricsCollector {
    started: Instant,
    cpu_started: Option<Duration>,
}

impl MetricsCollector {
    /// Starts the monotonic run timer and takes a CPU time reading.
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            cpu_started: cpu::process_cpu_time(),
        }
    }

    /// Stops the timer and builds the report.
    #[must_use]
    pub fn finish(
        self,
        config: &RunConfig,
        seed: u64,
        counters: AccessSnapshot,
        timeline: Option<Vec<AccessInterval>>,
    ) -> RunReport {
        let elapsed = self.started.elapsed();
        let cpu_time = cpu::cpu_time_since(self.cpu_started);
        Self::report(config, seed, counters, elapsed, cpu_time, timeline)
    }

    /// Builds a report for a known elapsed time.
    #[must_use]
    pub fn report(
        config: &RunConfig,
        seed: u64,
        counters: AccessSnapshot,
        elapsed: Duration,
        cpu_time: Option<Duration>,
        timeline: Option<Vec<AccessInterval>>,
    ) -> RunReport {
        let seconds = elapsed.as_secs_f64();
        RunReport {
            policy: config.policy(),
            seed,
            num_readers: config.num_readers(),
            num_writers: config.num_writers(),
            completed_reads: counters.completed_reads,
            completed_writes: counters.completed_writes,
            read_waits: counters.read_waits,
            write_waits: counters.write_waits,
            elapsed,
            elapsed_seconds: seconds,
            read_throughput: per_second(counters.completed_reads, seconds),
            write_throughput: per_second(counters.completed_writes, seconds),
            total_throughput: per_second(counters.completed_reads + counters.completed_writes, seconds),
            cpu_time,
            timeline,
        }
    }
}
