//! Tests for utility functions

use prometheus_rule_scheduler::util::{init_test_tracing, init_tracing, DEFAULT_LOG_FILTER};

#[test]
fn test_default_filter_names_crate() {
    assert!(DEFAULT_LOG_FILTER.starts_with("prometheus_rule_scheduler"));
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_test_tracing();
    init_tracing();
    init_tracing();
    tracing::info!("tracing initialized");
}
