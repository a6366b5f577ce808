//! # Run Configuration
//!
//! [`RunConfig`] is the validated, immutable input of one run.
//! [`RunSettings`] is the optional TOML settings file the driver loads once
//! at startup; command line flags override it.
//!
//! ```toml
//! [run]
//! policy = "reader-priority"
//! verify = true
//!
//! [workload]
//! time_unit_ms = 1000
//! min_units = 1
//! max_units = 3
//! seed = 42
//!
//! [report]
//! summary_csv = "output/summary_metrics.csv"
//! scenario = "balanced"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{RunError, RunResult};
use crate::participant::Role;
use crate::policy::Policy;

/// Default length of one operation time unit.
pub const DEFAULT_TIME_UNIT: Duration = Duration::from_secs(1);
/// Default shortest operation, in time units.
pub const DEFAULT_MIN_UNITS: u32 = 1;
/// Default longest operation, in time units.
pub const DEFAULT_MAX_UNITS: u32 = 3;

/// Shape of the simulated operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkloadConfig {
    /// Length of one time unit.
    pub time_unit: Duration,
    /// Shortest operation, inclusive.
    pub min_units: u32,
    /// Longest operation, inclusive.
    pub max_units: u32,
    /// Seed for the role plan and durations. `None` seeds from the clock.
    pub seed: Option<u64>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            time_unit: DEFAULT_TIME_UNIT,
            min_units: DEFAULT_MIN_UNITS,
            max_units: DEFAULT_MAX_UNITS,
            seed: None,
        }
    }
}

impl WorkloadConfig {
    /// Fast workload for tests and smoke runs: 1..=3 units of `unit_ms` ms.
    #[must_use]
    pub fn quick(unit_ms: u64, seed: u64) -> Self {
        Self {
            time_unit: Duration::from_millis(unit_ms),
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Checks the duration range and time unit.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::InvalidConfiguration`] for a zero time unit, a zero
    /// minimum or an inverted range.
    pub fn validate(&self) -> RunResult<()> {
        if self.time_unit.is_zero() {
            return Err(RunError::InvalidConfiguration(
                "time unit must be greater than zero".to_string(),
            ));
        }
        if self.min_units == 0 {
            return Err(RunError::InvalidConfiguration(
                "operations must last at least one time unit".to_string(),
            ));
        }
        if self.min_units > self.max_units {
            return Err(RunError::InvalidConfiguration(format!(
                "operation range is empty: min {} > max {}",
                self.min_units, self.max_units
            )));
        }
        Ok(())
    }
}

/// Validated input of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    num_readers: usize,
    num_writers: usize,
    policy: Policy,
    workload: WorkloadConfig,
    record_timeline: bool,
}

fn positive_count(role: Role, value: i64) -> RunResult<usize> {
    if value <= 0 {
        return Err(RunError::InvalidParticipantCount { role, value });
    }
    usize::try_from(value).map_err(|_| RunError::InvalidParticipantCount { role, value })
}

impl RunConfig {
    /// Validates the participant counts.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::InvalidParticipantCount`] if either count is zero or
    /// negative.
    pub fn new(num_readers: i64, num_writers: i64, policy: Policy) -> RunResult<Self> {
        Ok(Self {
            num_readers: positive_count(Role::Reader, num_readers)?,
            num_writers: positive_count(Role::Writer, num_writers)?,
            policy,
            workload: WorkloadConfig::default(),
            record_timeline: false,
        })
    }

    /// Replaces the workload.
    #[must_use]
    pub fn with_workload(mut self, workload: WorkloadConfig) -> Self {
        self.workload = workload;
        self
    }

    /// Turns access timeline recording on or off.
    #[must_use]
    pub fn with_timeline(mut self, record: bool) -> Self {
        self.record_timeline = record;
        self
    }

    /// Re-checks everything, including the workload.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found.
    pub fn validate(&self) -> RunResult<()> {
        if self.num_readers == 0 {
            return Err(RunError::InvalidParticipantCount {
                role: Role::Reader,
                value: 0,
            });
        }
        if self.num_writers == 0 {
            return Err(RunError::InvalidParticipantCount {
                role: Role::Writer,
                value: 0,
            });
        }
        self.workload.validate()
    }

    /// Number of readers.
    #[must_use]
    pub fn num_readers(&self) -> usize {
        self.num_readers
    }

    /// Number of writers.
    #[must_use]
    pub fn num_writers(&self) -> usize {
        self.num_writers
    }

    /// Readers plus writers.
    #[must_use]
    pub fn participants(&self) -> usize {
        self.num_readers + self.num_writers
    }

    /// Selected policy.
    #[must_use]
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Workload shape.
    #[must_use]
    pub fn workload(&self) -> &WorkloadConfig {
        &self.workload
    }

    /// Whether the access timeline is recorded.
    #[must_use]
    pub fn records_timeline(&self) -> bool {
        self.record_timeline
    }
}

/// `[run]` table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSection {
    /// Policy used when none is given on the command line.
    pub policy: Option<Policy>,
    /// Record the timeline and check exclusion.
    pub verify: bool,
}

/// `[workload]` table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkloadSection {
    /// Time unit in milliseconds.
    pub time_unit_ms: Option<u64>,
    /// Shortest operation in units.
    pub min_units: Option<u32>,
    /// Longest operation in units.
    pub max_units: Option<u32>,
    /// Fixed RNG seed.
    pub seed: Option<u64>,
}

/// `[report]` table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportSection {
    /// Summary CSV to append to.
    pub summary_csv: Option<PathBuf>,
    /// Scenario label for the CSV row.
    pub scenario: Option<String>,
}

/// Settings file contents. Every table and key is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    /// `[run]` table.
    pub run: RunSection,
    /// `[workload]` table.
    pub workload: WorkloadSection,
    /// `[report]` table.
    pub report: ReportSection,
}

impl RunSettings {
    /// Parses settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Settings`] on malformed TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> RunResult<Self> {
        toml::from_str(text).map_err(|e| RunError::Settings(e.to_string()))
    }

    /// Reads and parses a settings file.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Settings`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> RunResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| RunError::Settings(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// The workload described by the `[workload]` table, defaults filled in.
    #[must_use]
    pub fn workload(&self) -> WorkloadConfig {
        let defaults = WorkloadConfig::default();
        WorkloadConfig {
            time_unit: self
                .workload
                .time_unit_ms
                .map_or(defaults.time_unit, Duration::from_millis),
            min_units: self.workload.min_units.unwrap_or(defaults.min_units),
            max_units: self.workload.max_units.unwrap_or(defaults.max_units),
            seed: self.workload.seed,
        }
    }
}
