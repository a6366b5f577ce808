//! # RWGATE Driver
//!
//! Spawns N readers and M writers under one admission policy and prints the
//! completion counts, elapsed time and throughput.
//!
//! ## Usage
//!
//! ```bash
//! rwgate 10 5                          # writer-priority, 1..=3 s operations
//! rwgate 10 5 reader-priority --seed 7
//! rwgate 50 50 busy-wait --time-unit-ms 10 --verify
//! rwgate 20 5 barrier --summary-csv output/summary_metrics.csv --scenario heavy-read
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing::Level;

use rwgate_core::{run, Policy, RunConfig, RunError, RunResult, RunSettings, WorkloadConfig};

/// Reader-writer policy benchmark.
#[derive(Parser, Debug)]
#[command(name = "rwgate", version, about, allow_negative_numbers = true)]
struct Cli {
    /// Number of reader participants (positive integer).
    num_readers: i64,

    /// Number of writer participants (positive integer).
    num_writers: i64,

    /// Admission policy: writer-priority, reader-priority, busy-wait or barrier.
    policy: Option<Policy>,

    /// TOML settings file; command line flags take precedence.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Seed for the role order and operation durations.
    #[arg(long)]
    seed: Option<u64>,

    /// Length of one operation time unit in milliseconds.
    #[arg(long, value_name = "MS")]
    time_unit_ms: Option<u64>,

    /// Shortest operation in time units.
    #[arg(long)]
    min_units: Option<u32>,

    /// Longest operation in time units.
    #[arg(long)]
    max_units: Option<u32>,

    /// Append a summary row to this CSV file.
    #[arg(long, value_name = "PATH")]
    summary_csv: Option<PathBuf>,

    /// Scenario label written to the summary CSV.
    #[arg(long)]
    scenario: Option<String>,

    /// Record every access interval and check mutual exclusion.
    #[arg(long)]
    verify: bool,

    /// Only print warnings and the final report.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Also print acquire/release debugging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn log_level(&self) -> Level {
        if self.quiet {
            Level::WARN
        } else if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }

    /// Settings file values overridden by flags.
    fn workload(&self, settings: &RunSettings) -> WorkloadConfig {
        let base = settings.workload();
        WorkloadConfig {
            time_unit: self.time_unit_ms.map_or(base.time_unit, Duration::from_millis),
            min_units: self.min_units.unwrap_or(base.min_units),
            max_units: self.max_units.unwrap_or(base.max_units),
            seed: self.seed.or(base.seed),
        }
    }
}

fn init_logging(level: Level) {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: could not install log subscriber: {e}");
    }
}

fn execute(cli: &Cli, settings: &RunSettings, config: RunConfig) -> RunResult<()> {
    let verify = config.records_timeline();
    let report = run(config)?;

    println!();
    println!("{report}");

    if verify {
        report
            .verify_exclusion()
            .map_err(|overlap| RunError::ExclusionViolated(overlap.to_string()))?;
        let checked = report.timeline.as_ref().map_or(0, Vec::len);
        println!("Mutual exclusion verified over {checked} operations");
    }

    let summary_csv = cli.summary_csv.as_ref().or(settings.report.summary_csv.as_ref());
    if let Some(path) = summary_csv {
        let scenario = cli
            .scenario
            .as_deref()
            .or(settings.report.scenario.as_deref())
            .unwrap_or("default");
        report.append_summary_csv(path, scenario)?;
        tracing::debug!(path = %path.display(), "summary row appended");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level());

    let settings = match cli.config.as_deref().map(RunSettings::load).transpose() {
        Ok(settings) => settings.unwrap_or_default(),
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let policy = cli.policy.or(settings.run.policy).unwrap_or_default();
    let config = match RunConfig::new(cli.num_readers, cli.num_writers, policy) {
        Ok(config) => config,
        Err(e) => Cli::command().error(ErrorKind::ValueValidation, e).exit(),
    };
    let config = config
        .with_workload(cli.workload(&settings))
        .with_timeline(cli.verify || settings.run.verify);

    match execute(&cli, &settings, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_positional_policy() {
        let cli = Cli::try_parse_from(["rwgate", "3", "2", "busy-wait"]).unwrap();
        assert_eq!(cli.num_readers, 3);
        assert_eq!(cli.num_writers, 2);
        assert_eq!(cli.policy, Some(Policy::NoPriorityBusyWait));
    }

    #[test]
    fn test_negative_count_parses_then_fails_validation() {
        let cli = Cli::try_parse_from(["rwgate", "3", "-1"]).unwrap();
        assert!(RunConfig::new(cli.num_readers, cli.num_writers, Policy::default()).is_err());
    }

    #[test]
    fn test_non_numeric_count_rejected() {
        assert!(Cli::try_parse_from(["rwgate", "three", "2"]).is_err());
        assert!(Cli::try_parse_from(["rwgate", "3"]).is_err());
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!(Cli::try_parse_from(["rwgate", "3", "2", "lottery"]).is_err());
    }

    #[test]
    fn test_flags_override_settings() {
        let settings = RunSettings::from_toml_str("[workload]\ntime_unit_ms = 500\nmax_units = 5\nseed = 1\n").unwrap();
        let cli = Cli::try_parse_from(["rwgate", "1", "1", "--time-unit-ms", "2", "--seed", "9"]).unwrap();

        let workload = cli.workload(&settings);
        assert_eq!(workload.time_unit, Duration::from_millis(2));
        assert_eq!(workload.max_units, 5);
        assert_eq!(workload.seed, Some(9));
    }

    #[test]
    fn test_quiet_and_verbose_conflict() {
        assert!(Cli::try_parse_from(["rwgate", "1", "1", "-q", "-v"]).is_err());
        let cli = Cli::try_parse_from(["rwgate", "1", "1", "-q"]).unwrap();
        assert_eq!(cli.log_level(), Level::WARN);
    }
}
