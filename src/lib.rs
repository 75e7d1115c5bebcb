//! # Prometheus Rule Scheduler
//!
//! A rule-based mutual-exclusion job scheduler.
//!
//! Jobs run on a fixed pool of worker threads. Each job may carry a
//! *scheduling rule*; the scheduler guarantees that two jobs whose rules
//! conflict never run at the same time. Threads that are not jobs can take
//! the same rules synchronously with `begin_rule`/`end_rule`, and both paths
//! are checked against one ledger of held rules.
//!
//! ## Key Features
//!
//! - **Pluggable rules**: implement [`core::SchedulingRule`] with `contains`
//!   and `is_conflicting`; [`core::MultiRule`] composes rules
//! - **Priority classes**: interactive, short, long, build and decorate jobs,
//!   FIFO within a class
//! - **Delayed jobs**: a sleeping queue with timed wake-up, explicit
//!   `sleep`/`wake_up`, and rescheduling from inside a running job
//! - **Nested acquisition**: a holder may re-acquire any rule its current rule
//!   contains without blocking
//! - **Job change events**: listeners observe every state transition
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use prometheus_rule_scheduler::core::{Job, JobResult, PathRule, Scheduler};
//!
//! let scheduler = Scheduler::builder().with_worker_count(4).build()?;
//!
//! let build = Job::from_fn("build", |_| JobResult::Ok).with_rule(PathRule::shared("/project"))?;
//! let save = Job::from_fn("save", |_| JobResult::Ok).with_rule(PathRule::shared("/project/a.txt"))?;
//! scheduler.schedule(&build, Duration::ZERO)?;
//! scheduler.schedule(&save, Duration::ZERO)?; // runs after `build`
//!
//! let rule = PathRule::shared("/other");
//! scheduler.begin_rule(rule.clone())?;
//! // ... exclusive work on /other ...
//! scheduler.end_rule(&rule)?;
//!
//! scheduler.join(&save);
//! scheduler.shutdown();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: rules, jobs, the rule ledger and the scheduler.
pub mod core;
/// Configuration models for the scheduler and its worker threads.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Process-wide scheduler instance.
pub mod runtime;
/// Shared utilities.
pub mod util;
