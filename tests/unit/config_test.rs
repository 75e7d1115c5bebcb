//! Tests for configuration validation

use prometheus_rule_scheduler::config::scheduler::{
    ENV_SHUTDOWN_TIMEOUT_MS, ENV_THREAD_PREFIX, ENV_WORKER_COUNT,
};
use prometheus_rule_scheduler::config::SchedulerConfig;

#[test]
fn test_scheduler_config_validation() {
    let valid = SchedulerConfig::new().with_worker_count(2);
    assert!(valid.validate().is_ok());
}

#[test]
fn test_scheduler_config_invalid_worker_count() {
    let invalid = SchedulerConfig::new().with_worker_count(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_timeout() {
    let invalid = SchedulerConfig::new().with_shutdown_timeout_ms(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_from_json_partial() {
    let cfg = SchedulerConfig::from_json_str(r#"{"worker_count": 3, "thread_name_prefix": "jobs"}"#)
        .expect("valid json");
    assert_eq!(cfg.worker_count, 3);
    assert_eq!(cfg.thread_name_prefix, "jobs");
    assert_eq!(cfg.shutdown_timeout_ms, SchedulerConfig::default().shutdown_timeout_ms);
}

#[test]
fn test_scheduler_config_from_json_rejects_invalid() {
    assert!(SchedulerConfig::from_json_str(r#"{"worker_count": 0}"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_scheduler_config_serde_roundtrip() {
    let cfg = SchedulerConfig::new()
        .with_worker_count(5)
        .with_thread_name_prefix("io");
    let json = serde_json::to_string(&cfg).expect("serialize");
    let back: SchedulerConfig = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, cfg);
}

// The only test in this binary that touches the process environment.
#[test]
fn test_scheduler_config_from_env() {
    std::env::set_var(ENV_WORKER_COUNT, "3");
    std::env::set_var(ENV_THREAD_PREFIX, "env-worker");
    std::env::set_var(ENV_SHUTDOWN_TIMEOUT_MS, "750");
    let cfg = SchedulerConfig::from_env().expect("env config");
    assert_eq!(cfg.worker_count, 3);
    assert_eq!(cfg.thread_name_prefix, "env-worker");
    assert_eq!(cfg.shutdown_timeout_ms, 750);

    std::env::set_var(ENV_WORKER_COUNT, "many");
    let err = SchedulerConfig::from_env().unwrap_err();
    assert!(err.contains(ENV_WORKER_COUNT));

    std::env::remove_var(ENV_WORKER_COUNT);
    std::env::remove_var(ENV_THREAD_PREFIX);
    std::env::remove_var(ENV_SHUTDOWN_TIMEOUT_MS);
}
