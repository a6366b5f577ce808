//! Integration tests for full coordinated runs.
//!
//! Every policy must keep readers and writers apart, finish every
//! participant exactly once and report consistent throughput.

use crossbeam_channel::bounded;
use rwgate_core::{
    run, Operation, Participant, Policy, Role, RunConfig, RunCoordinator, RunError, WorkloadConfig,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn quick_config(readers: i64, writers: i64, policy: Policy, seed: u64) -> RunConfig {
    RunConfig::new(readers, writers, policy)
        .unwrap()
        .with_workload(WorkloadConfig::quick(2, seed))
        .with_timeline(true)
}

#[test]
fn test_every_policy_is_exclusive_and_complete() {
    for policy in Policy::ALL {
        let report = run(quick_config(6, 4, policy, 5)).unwrap();

        assert_eq!(report.completed_reads, 6, "{policy}");
        assert_eq!(report.completed_writes, 4, "{policy}");
        assert_eq!(report.policy, policy);

        let timeline = report.timeline.as_ref().unwrap();
        assert_eq!(timeline.len(), 10);
        if let Err(overlap) = report.verify_exclusion() {
            panic!("{policy}: {overlap}");
        }
    }
}

#[test]
fn test_three_readers_two_writers() {
    let report = run(quick_config(3, 2, Policy::WriterPriority, 1)).unwrap();

    assert_eq!(report.completed_reads, 3);
    assert_eq!(report.completed_writes, 2);

    let expected = 5.0 / report.elapsed_seconds;
    assert!((report.total_throughput - expected).abs() < 1e-6);
    assert!((report.read_throughput - 3.0 / report.elapsed_seconds).abs() < 1e-6);
    assert!((report.write_throughput - 2.0 / report.elapsed_seconds).abs() < 1e-6);
}

#[test]
fn test_busy_wait_liveness() {
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let result = run(quick_config(8, 8, Policy::NoPriorityBusyWait, 9));
        tx.send(result).ok();
    });

    let report = rx
        .recv_timeout(Duration::from_secs(30))
        .expect("busy-wait run did not finish")
        .unwrap();
    assert_eq!(report.completed_reads, 8);
    assert_eq!(report.completed_writes, 8);
}

#[test]
fn test_invalid_counts_rejected() {
    assert!(matches!(
        RunConfig::new(0, 2, Policy::WriterPriority),
        Err(RunError::InvalidParticipantCount {
            role: Role::Reader,
            value: 0
        })
    ));
    assert!(matches!(
        RunConfig::new(2, -1, Policy::ReaderPriority),
        Err(RunError::InvalidParticipantCount {
            role: Role::Writer,
            value: -1
        })
    ));
}

#[test]
fn test_elapsed_covers_longest_operation() {
    let config = RunConfig::new(1, 1, Policy::ReaderPriority)
        .unwrap()
        .with_workload(WorkloadConfig {
            time_unit: Duration::from_millis(10),
            min_units: 2,
            max_units: 2,
            seed: Some(0),
        });
    let start = Instant::now();
    let report = run(config).unwrap();

    // One reader and one writer cannot overlap: at least two full operations.
    assert!(report.elapsed >= Duration::from_millis(40));
    assert!(report.elapsed <= start.elapsed());
}

#[test]
fn test_same_seed_same_plan() {
    let a = run(quick_config(4, 4, Policy::SynchronizedStartWriterPriority, 77)).unwrap();
    let b = run(quick_config(4, 4, Policy::SynchronizedStartWriterPriority, 77)).unwrap();
    assert_eq!(a.seed, b.seed);
    assert_eq!(a.total_operations(), b.total_operations());
}

struct FailingWriter;

impl Operation for FailingWriter {
    fn perform(&self, participant: &Participant) {
        if participant.role == Role::Writer && participant.id == 0 {
            panic!("simulated write failure");
        }
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_participant_panic_fails_run_without_deadlock() {
    for policy in Policy::ALL {
        let config = RunConfig::new(3, 2, policy)
            .unwrap()
            .with_workload(WorkloadConfig::quick(1, 3));
        let coordinator = RunCoordinator::with_operation(config, Arc::new(FailingWriter));

        let err = coordinator.run().unwrap_err();
        assert_eq!(
            err,
            RunError::ParticipantPanicked {
                role: Role::Writer,
                id: 0
            },
            "{policy}"
        );
    }
}
