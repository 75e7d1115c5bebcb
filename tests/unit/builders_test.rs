//! Tests for builder modules

use std::sync::Arc;
use std::time::Duration;

use prometheus_rule_scheduler::builders::{build_scheduler, SchedulerBuilder};
use prometheus_rule_scheduler::config::SchedulerConfig;
use prometheus_rule_scheduler::core::{
    Job, JobEventKind, JobResult, RecordingListener, SchedulerError,
};

#[test]
fn test_builder_applies_config() {
    let scheduler = SchedulerBuilder::new()
        .with_worker_count(2)
        .with_thread_name_prefix("builder-test")
        .build()
        .expect("scheduler");
    assert_eq!(scheduler.config().worker_count, 2);
    assert_eq!(scheduler.config().thread_name_prefix, "builder-test");
    assert_eq!(scheduler.stats().worker_count, 2);
    scheduler.shutdown();
}

#[test]
fn test_builder_rejects_invalid_config() {
    let err = SchedulerBuilder::new().with_worker_count(0).build().err();
    assert!(matches!(err, Some(SchedulerError::InvalidConfig(_))));
}

#[test]
fn test_builder_registers_listener_before_start() {
    let recorder = Arc::new(RecordingListener::new(64));
    let scheduler = SchedulerBuilder::new()
        .with_worker_count(1)
        .with_listener(recorder.clone())
        .build()
        .expect("scheduler");

    let job = Job::from_fn("listened", |_| JobResult::Ok);
    scheduler.schedule(&job, Duration::ZERO).expect("schedule");
    scheduler.join(&job);
    scheduler.shutdown();

    let kinds = recorder.kinds_for(job.id());
    assert_eq!(kinds.first(), Some(&JobEventKind::Scheduled { delay: Duration::ZERO }));
    assert!(kinds.contains(&JobEventKind::Running));
}

#[test]
fn test_build_scheduler_from_config() {
    let cfg = SchedulerConfig::new().with_worker_count(1);
    let scheduler = build_scheduler(&cfg).expect("scheduler");
    assert!(scheduler.is_active());
    scheduler.shutdown();
    assert!(!scheduler.is_active());
}

#[test]
fn test_build_scheduler_invalid_config_has_context() {
    let cfg = SchedulerConfig::new().with_worker_count(0);
    let err = build_scheduler(&cfg).err().expect("invalid config");
    assert!(err.to_string().contains("failed to start scheduler"));
    assert!(err.downcast_ref::<SchedulerError>().is_some());
}
