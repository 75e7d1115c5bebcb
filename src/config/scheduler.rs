//! Scheduler configuration.

use std::env;

use serde::{Deserialize, Serialize};

/// Environment variable overriding [`SchedulerConfig::worker_count`].
pub const ENV_WORKER_COUNT: &str = "RULE_SCHEDULER_WORKER_COUNT";
/// Environment variable overriding [`SchedulerConfig::thread_stack_size`].
pub const ENV_STACK_SIZE: &str = "RULE_SCHEDULER_STACK_SIZE";
/// Environment variable overriding [`SchedulerConfig::thread_name_prefix`].
pub const ENV_THREAD_PREFIX: &str = "RULE_SCHEDULER_THREAD_PREFIX";
/// Environment variable overriding [`SchedulerConfig::shutdown_timeout_ms`].
pub const ENV_SHUTDOWN_TIMEOUT_MS: &str = "RULE_SCHEDULER_SHUTDOWN_TIMEOUT_MS";

const MIN_STACK_SIZE: usize = 64 * 1024;

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of worker threads; also the maximum number of concurrently running jobs.
    pub worker_count: usize,
    /// Stack size for each worker thread in bytes.
    pub thread_stack_size: usize,
    /// Worker thread name prefix.
    pub thread_name_prefix: String,
    /// How long shutdown waits for each worker thread, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            thread_stack_size: 2 * 1024 * 1024,
            thread_name_prefix: "rule-worker".into(),
            shutdown_timeout_ms: 2000,
        }
    }
}

impl SchedulerConfig {
    /// Configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the per-worker shutdown timeout.
    #[must_use]
    pub const fn with_shutdown_timeout_ms(mut self, ms: u64) -> Self {
        self.shutdown_timeout_ms = ms;
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.thread_stack_size < MIN_STACK_SIZE {
            return Err(format!(
                "thread_stack_size must be at least {MIN_STACK_SIZE} bytes"
            ));
        }
        if self.shutdown_timeout_ms == 0 {
            return Err("shutdown_timeout_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load defaults overridden by environment variables, reading a `.env` file first if present.
    ///
    /// # Errors
    ///
    /// Returns a description of the first unparsable variable or validation failure.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        if let Some(v) = read_env(ENV_WORKER_COUNT)? {
            cfg.worker_count = v;
        }
        if let Some(v) = read_env(ENV_STACK_SIZE)? {
            cfg.thread_stack_size = v;
        }
        if let Ok(prefix) = env::var(ENV_THREAD_PREFIX) {
            cfg.thread_name_prefix = prefix;
        }
        if let Some(v) = read_env(ENV_SHUTDOWN_TIMEOUT_MS)? {
            cfg.shutdown_timeout_ms = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn read_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{key}: {e}")),
        Err(_) => Ok(None),
    }
}
