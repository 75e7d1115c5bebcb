//! Per-holder stacks of rules acquired through `begin_rule`/`end_rule`, and
//! the explicit acquisition context that owns one.

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use super::job::{Job, JobId};
use super::ledger::RuleHolder;
use super::rule::{rules_contain, same_rule, RuleRef, SchedulingRule};
use super::scheduler::Shared;
use super::SchedulerError;

/// One acquired rule.
#[derive(Debug, Clone)]
pub struct RuleFrame {
    /// The acquired rule.
    pub rule: RuleRef,
    /// When it was pushed.
    pub acquired_at: Instant,
}

/// Stack of nested rule acquisitions for one holder.
///
/// Only the outermost acquisition is recorded in the ledger; inner frames must
/// be contained by the frame below them. A stack may sit on a base rule it
/// did not acquire itself (a running job's rule), which is never popped.
/// A stack owned by a job run is discarded when that run finishes.
#[derive(Debug, Default)]
pub struct RuleStack {
    base: Option<RuleRef>,
    owner: Option<JobId>,
    frames: Vec<RuleFrame>,
}

impl RuleStack {
    /// Empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stack for one run of `job`, based on the job's rule.
    pub(crate) fn for_job(job: &Job) -> Self {
        Self {
            base: job.rule(),
            owner: Some(job.id()),
            frames: Vec::new(),
        }
    }

    pub(crate) fn is_owned_by(&self, job: JobId) -> bool {
        self.owner == Some(job)
    }

    /// Innermost rule in effect, including the base rule.
    #[must_use]
    pub fn top(&self) -> Option<&RuleRef> {
        self.frames.last().map(|f| &f.rule).or(self.base.as_ref())
    }

    /// Acquired frames, outermost first.
    #[must_use]
    pub fn frames(&self) -> &[RuleFrame] {
        &self.frames
    }

    /// Number of acquired frames.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frame has been acquired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Check that `rule` may be pushed: the current top must contain it.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidNesting`] otherwise.
    pub fn check_nesting(&self, rule: &dyn SchedulingRule) -> Result<(), SchedulerError> {
        match self.top() {
            Some(top) if !rules_contain(top.as_ref(), rule) => {
                Err(SchedulerError::InvalidNesting {
                    held: format!("{top:?}"),
                    requested: format!("{rule:?}"),
                })
            }
            _ => Ok(()),
        }
    }

    /// Check that `rule` is the top frame and may be popped.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::RuleNotHeld`] if no frame is held
    /// - [`SchedulerError::MismatchedRelease`] if `rule` is not the top frame
    pub fn check_release(&self, rule: &dyn SchedulingRule) -> Result<(), SchedulerError> {
        match self.frames.last() {
            None => Err(SchedulerError::RuleNotHeld(format!("{rule:?}"))),
            Some(top) if !same_rule(top.rule.as_ref(), rule) => {
                Err(SchedulerError::MismatchedRelease {
                    expected: format!("{:?}", top.rule),
                    actual: format!("{rule:?}"),
                })
            }
            Some(_) => Ok(()),
        }
    }

    /// Whether the next push acquires through the ledger.
    pub(crate) fn acquires_on_push(&self) -> bool {
        self.base.is_none() && self.frames.is_empty()
    }

    /// Whether the next pop releases the ledger entry.
    pub(crate) fn releases_on_pop(&self) -> bool {
        self.base.is_none() && self.frames.len() == 1
    }

    /// Whether the stack can be forgotten without losing state.
    pub(crate) fn is_disposable(&self) -> bool {
        self.base.is_none() && self.owner.is_none() && self.frames.is_empty()
    }

    pub(crate) fn push(&mut self, rule: RuleRef) {
        self.frames.push(RuleFrame {
            rule,
            acquired_at: Instant::now(),
        });
    }

    pub(crate) fn pop(&mut self) -> Option<RuleFrame> {
        self.frames.pop()
    }
}

/// An explicit acquisition context with its own rule stack.
///
/// Code that brackets work with `begin_rule`/`end_rule` passes the context
/// down its call chain instead of relying on thread identity. Dropping a
/// context that still holds rules releases them.
///
/// A job's context lives only as long as the job runs. If the body keeps it
/// past the end of the run, its rules are gone and later calls acquire
/// through the ledger like any other context.
pub struct RuleContext {
    shared: Arc<Shared>,
    holder: RuleHolder,
}

impl RuleContext {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self::with_stack(shared, RuleStack::new())
    }

    pub(crate) fn for_job(shared: Arc<Shared>, job: &Job) -> Self {
        Self::with_stack(shared, RuleStack::for_job(job))
    }

    fn with_stack(shared: Arc<Shared>, stack: RuleStack) -> Self {
        let holder = RuleHolder::Context(Uuid::new_v4());
        shared.register_stack(holder, stack);
        Self { shared, holder }
    }

    /// Ledger identity of this context.
    #[must_use]
    pub const fn holder(&self) -> RuleHolder {
        self.holder
    }

    /// Acquire `rule`, blocking until it conflicts with nothing held elsewhere.
    ///
    /// Nested calls must request a rule the current top contains; they never block.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidNesting`] if the held rule does not contain `rule`
    /// - [`SchedulerError::InvalidRule`] if `rule` breaks the rule contract
    /// - [`SchedulerError::ShutDown`] if the scheduler shuts down first
    pub fn begin_rule(&self, rule: RuleRef) -> Result<(), SchedulerError> {
        self.shared.begin_rule(self.holder, rule)
    }

    /// Release the innermost rule, which must be `rule`.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::MismatchedRelease`] if `rule` is not the innermost rule
    /// - [`SchedulerError::RuleNotHeld`] if nothing is held
    pub fn end_rule(&self, rule: &RuleRef) -> Result<(), SchedulerError> {
        self.shared.end_rule(self.holder, rule)
    }

    /// Number of rules currently acquired through this context.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.shared.stack_depth(self.holder)
    }
}

impl Drop for RuleContext {
    fn drop(&mut self) {
        self.shared.release_stack(self.holder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MultiRule, ResourceRule};

    #[test]
    fn test_nesting_requires_containment() {
        let mut stack = RuleStack::new();
        let outer: RuleRef = Arc::new(MultiRule::new([
            ResourceRule::shared("r1"),
            ResourceRule::shared("r2"),
        ]));
        assert!(stack.check_nesting(outer.as_ref()).is_ok());
        stack.push(outer);

        assert!(stack.check_nesting(&ResourceRule::new("r1")).is_ok());
        let err = stack.check_nesting(&ResourceRule::new("r3")).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidNesting { .. }));
    }

    #[test]
    fn test_release_must_match_top() {
        let mut stack = RuleStack::new();
        let r1: RuleRef = Arc::new(MultiRule::new([
            ResourceRule::shared("a"),
            ResourceRule::shared("b"),
        ]));
        let r2 = ResourceRule::shared("a");
        stack.push(r1.clone());
        stack.push(r2.clone());

        let err = stack.check_release(r1.as_ref()).unwrap_err();
        assert!(matches!(err, SchedulerError::MismatchedRelease { .. }));
        assert_eq!(stack.depth(), 2);
        assert!(stack.check_release(r2.as_ref()).is_ok());
    }

    #[test]
    fn test_release_on_empty_stack() {
        let stack = RuleStack::new();
        let err = stack.check_release(&ResourceRule::new("a")).unwrap_err();
        assert!(matches!(err, SchedulerError::RuleNotHeld(_)));
    }

    #[test]
    fn test_base_rule_governs_nesting_and_ledger() {
        let job = Job::from_fn("based", |_| crate::core::JobResult::Ok)
            .with_rule(ResourceRule::shared("db"))
            .unwrap();
        let stack = RuleStack::for_job(&job);
        assert!(!stack.acquires_on_push());
        assert!(stack.check_nesting(&ResourceRule::new("db")).is_ok());
        assert!(stack.check_nesting(&ResourceRule::new("cache")).is_err());
        assert!(!stack.is_disposable());
        assert!(stack.is_owned_by(job.id()));
    }

    #[test]
    fn test_job_stack_without_rule_is_kept_until_run_ends() {
        let job = Job::from_fn("ruleless", |_| crate::core::JobResult::Ok);
        let stack = RuleStack::for_job(&job);
        assert!(stack.acquires_on_push());
        assert!(!stack.is_disposable());
        assert!(!RuleStack::new().is_owned_by(job.id()));
    }

    #[test]
    fn test_ledger_entry_lifecycle() {
        let mut stack = RuleStack::new();
        assert!(stack.acquires_on_push());
        stack.push(ResourceRule::shared("a"));
        assert!(!stack.acquires_on_push());
        assert!(stack.releases_on_pop());
        stack.push(ResourceRule::shared("a"));
        assert!(!stack.releases_on_pop());
    }
}
