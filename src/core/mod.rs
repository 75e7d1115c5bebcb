//! Core scheduling abstractions: rules, jobs, the rule ledger and the scheduler.

pub mod error;
pub mod events;
pub mod job;
pub mod ledger;
pub mod multi_rule;
pub mod rule;
pub mod rule_stack;
pub mod scheduler;
pub mod stats;

mod queue;
mod worker;

pub use error::{AppResult, SchedulerError};
pub use events::{JobChangeEvent, JobChangeListener, JobEventKind, RecordingListener};
pub use job::{Job, JobBody, JobContext, JobId, JobPriority, JobResult, JobState};
pub use ledger::{RuleHolder, RuleLedger};
pub use multi_rule::MultiRule;
pub use rule::{
    rules_conflict, rules_contain, same_rule, validate_rule, PathRule, ResourceRule, RuleRef,
    SchedulingRule,
};
pub use rule_stack::{RuleContext, RuleFrame, RuleStack};
pub use scheduler::Scheduler;
pub use stats::SchedulerStats;
