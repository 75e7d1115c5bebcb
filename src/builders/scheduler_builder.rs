//! Builders to construct schedulers from configuration.

use std::sync::Arc;

use anyhow::Context;

use crate::config::SchedulerConfig;
use crate::core::{AppResult, JobChangeListener, Scheduler, SchedulerError};

/// Fluent construction of a [`Scheduler`] with listeners registered before
/// any thread starts.
#[derive(Default)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    listeners: Vec<Arc<dyn JobChangeListener>>,
}

impl SchedulerBuilder {
    /// Builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.config.worker_count = worker_count;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Register a job change listener.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn JobChangeListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Start the scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] for an invalid configuration
    /// or a thread spawn failure.
    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        Scheduler::with_listeners(self.config, self.listeners)
    }
}

/// Build a scheduler from configuration.
///
/// # Errors
///
/// Fails when the configuration is invalid or threads cannot be spawned.
pub fn build_scheduler(cfg: &SchedulerConfig) -> AppResult<Scheduler> {
    Scheduler::new(cfg.clone()).context("failed to start scheduler")
}

/// Build a scheduler from `.env` and `RULE_SCHEDULER_*` environment variables.
///
/// # Errors
///
/// Fails when a variable cannot be parsed, the resulting configuration is
/// invalid, or threads cannot be spawned.
pub fn build_scheduler_from_env() -> AppResult<Scheduler> {
    let cfg = SchedulerConfig::from_env()
        .map_err(|e| anyhow::anyhow!("config invalid: {e}"))?;
    build_scheduler(&cfg)
}
