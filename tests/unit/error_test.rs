//! Tests for error types

use prometheus_rule_scheduler::core::SchedulerError;

#[test]
fn test_mismatched_release_error() {
    let err = SchedulerError::MismatchedRelease {
        expected: "R1".to_string(),
        actual: "R2".to_string(),
    };
    assert_eq!(
        format!("{}", err),
        "mismatched rule release: expected R1, got R2"
    );
}

#[test]
fn test_rule_not_held_error() {
    let err = SchedulerError::RuleNotHeld("R1".to_string());
    assert_eq!(format!("{}", err), "rule not held: R1");
}

#[test]
fn test_job_not_idle_error() {
    let err = SchedulerError::JobNotIdle("indexer".to_string());
    assert_eq!(format!("{}", err), "job indexer is not idle");
}

#[test]
fn test_shutdown_error() {
    let err = SchedulerError::ShutDown;
    assert_eq!(format!("{}", err), "scheduler has been shut down");
}

#[test]
fn test_timeout_error() {
    let err = SchedulerError::Timeout;
    assert_eq!(format!("{}", err), "operation timed out");
}

#[test]
fn test_error_converts_to_anyhow() {
    let err: anyhow::Error = SchedulerError::InvalidConfig("worker_count".to_string()).into();
    assert!(err.to_string().contains("worker_count"));
    assert_eq!(
        err.downcast_ref::<SchedulerError>(),
        Some(&SchedulerError::InvalidConfig("worker_count".to_string()))
    );
}
