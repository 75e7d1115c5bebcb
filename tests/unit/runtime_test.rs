//! Tests for the process-wide scheduler

use std::time::Duration;

use prometheus_rule_scheduler::config::SchedulerConfig;
use prometheus_rule_scheduler::core::{Job, JobResult, Scheduler};
use prometheus_rule_scheduler::runtime::{global, install, shutdown_global};

// Single test so the global slot is not shared between concurrently running tests.
#[test]
fn test_global_install_lifecycle() {
    assert!(global().is_none());

    let scheduler = Scheduler::new(SchedulerConfig::new().with_worker_count(1)).expect("scheduler");
    let installed = install(scheduler).expect("install");

    let second = Scheduler::new(SchedulerConfig::new().with_worker_count(1)).expect("scheduler");
    assert!(install(second).is_err());

    let job = Job::from_fn("global", |_| JobResult::Ok);
    let handle = global().expect("installed");
    handle.schedule(&job, Duration::ZERO).expect("schedule");
    assert!(handle.join_timeout(&job, Duration::from_secs(5)));
    assert_eq!(job.result(), Some(JobResult::Ok));

    assert!(shutdown_global());
    assert!(!installed.is_active());
    assert!(global().is_none());
    assert!(!shutdown_global());
}
