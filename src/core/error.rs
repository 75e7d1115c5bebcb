//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced by scheduler components.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// `begin_rule` was called while holding a rule that does not contain the new one.
    #[error("invalid rule nesting: held rule {held} does not contain {requested}")]
    InvalidNesting {
        /// Rule currently on top of the caller's stack.
        held: String,
        /// Rule the caller tried to acquire.
        requested: String,
    },
    /// `end_rule` was called with a rule that is not the top of the caller's stack.
    #[error("mismatched rule release: expected {expected}, got {actual}")]
    MismatchedRelease {
        /// Rule currently on top of the caller's stack.
        expected: String,
        /// Rule the caller tried to release.
        actual: String,
    },
    /// `end_rule` was called while the caller holds no rule.
    #[error("rule not held: {0}")]
    RuleNotHeld(String),
    /// A rule failed the contract checks.
    #[error("invalid scheduling rule: {0}")]
    InvalidRule(String),
    /// Rule or priority changes are only allowed while the job is idle.
    #[error("job {0} is not idle")]
    JobNotIdle(String),
    /// The scheduler has been shut down.
    #[error("scheduler has been shut down")]
    ShutDown,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The operation timed out.
    #[error("operation timed out")]
    Timeout,
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
