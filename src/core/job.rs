//! Jobs: units of schedulable work carrying an optional rule and a priority.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rule::{validate_rule, RuleRef};
use super::rule_stack::RuleContext;
use super::SchedulerError;

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Priority class used to order the waiting queue. Earlier variants run first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    /// User-facing work that should run immediately.
    Interactive,
    /// Short background work.
    Short,
    /// Long-running background work.
    #[default]
    Long,
    /// Build jobs.
    Build,
    /// Decoration and other cosmetic work.
    Decorate,
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Not scheduled, or finished.
    #[default]
    None,
    /// Queued and waiting for admission.
    Waiting,
    /// Scheduled with a delay, or put to sleep.
    Sleeping,
    /// Admitted: holds its rule and is executing on a worker.
    Running,
}

/// Outcome of a job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobResult {
    /// The body completed normally.
    Ok,
    /// The body failed with a reason.
    Error(String),
    /// The job was canceled before or while running.
    Canceled,
}

impl JobResult {
    /// Whether the run completed normally.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// The work a job performs.
///
/// Bodies run on a worker thread's own single-threaded tokio runtime, so
/// blocking inside a body only occupies that worker.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_rule_scheduler::core::{JobBody, JobContext, JobResult};
///
/// struct Compile;
///
/// #[async_trait]
/// impl JobBody for Compile {
///     async fn run(&self, ctx: JobContext) -> JobResult {
///         if ctx.is_canceled() {
///             return JobResult::Canceled;
///         }
///         JobResult::Ok
///     }
/// }
/// ```
#[async_trait]
pub trait JobBody: Send + Sync + 'static {
    /// Execute the job.
    async fn run(&self, ctx: JobContext) -> JobResult;
}

struct FnBody<F>(F);

#[async_trait]
impl<F> JobBody for FnBody<F>
where
    F: Fn(&JobContext) -> JobResult + Send + Sync + 'static,
{
    async fn run(&self, ctx: JobContext) -> JobResult {
        (self.0)(&ctx)
    }
}

/// Mutable job fields. Scheduler transitions happen while it holds its global lock.
#[derive(Debug)]
pub(crate) struct JobData {
    pub(crate) state: JobState,
    pub(crate) rule: Option<RuleRef>,
    pub(crate) priority: JobPriority,
    pub(crate) result: Option<JobResult>,
    pub(crate) stamp: u64,
    pub(crate) reschedule: Option<Duration>,
}

struct JobInner {
    id: JobId,
    name: String,
    body: Arc<dyn JobBody>,
    data: Mutex<JobData>,
    cancel_requested: AtomicBool,
}

/// A unit of schedulable work. Cloning yields another handle to the same job.
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

impl Job {
    /// Create an idle job with no rule and default priority.
    pub fn new(name: impl Into<String>, body: impl JobBody) -> Self {
        Self {
            inner: Arc::new(JobInner {
                id: JobId::new(),
                name: name.into(),
                body: Arc::new(body),
                data: Mutex::new(JobData {
                    state: JobState::None,
                    rule: None,
                    priority: JobPriority::default(),
                    result: None,
                    stamp: 0,
                    reschedule: None,
                }),
                cancel_requested: AtomicBool::new(false),
            }),
        }
    }

    /// Create a job from a synchronous closure.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&JobContext) -> JobResult + Send + Sync + 'static,
    {
        Self::new(name, FnBody(f))
    }

    /// Builder form of [`Job::set_rule`].
    ///
    /// # Errors
    ///
    /// See [`Job::set_rule`].
    pub fn with_rule(self, rule: RuleRef) -> Result<Self, SchedulerError> {
        self.set_rule(Some(rule))?;
        Ok(self)
    }

    /// Builder form of [`Job::set_priority`].
    ///
    /// # Errors
    ///
    /// See [`Job::set_priority`].
    pub fn with_priority(self, priority: JobPriority) -> Result<Self, SchedulerError> {
        self.set_priority(priority)?;
        Ok(self)
    }

    /// Job identifier.
    #[must_use]
    pub fn id(&self) -> JobId {
        self.inner.id
    }

    /// Human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.inner.data.lock().state
    }

    /// Rule the job holds while running.
    #[must_use]
    pub fn rule(&self) -> Option<RuleRef> {
        self.inner.data.lock().rule.clone()
    }

    /// Queue priority.
    #[must_use]
    pub fn priority(&self) -> JobPriority {
        self.inner.data.lock().priority
    }

    /// Result of the most recent run, if any.
    #[must_use]
    pub fn result(&self) -> Option<JobResult> {
        self.inner.data.lock().result.clone()
    }

    /// Assign the rule. Only allowed while the job is idle.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::JobNotIdle`] if the job is waiting, sleeping or running
    /// - [`SchedulerError::InvalidRule`] if the rule breaks the rule contract
    pub fn set_rule(&self, rule: Option<RuleRef>) -> Result<(), SchedulerError> {
        if let Some(rule) = rule.as_ref() {
            validate_rule(rule.as_ref())?;
        }
        let mut data = self.inner.data.lock();
        if data.state != JobState::None {
            return Err(SchedulerError::JobNotIdle(self.inner.name.clone()));
        }
        data.rule = rule;
        Ok(())
    }

    /// Change the priority. Only allowed while the job is idle.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::JobNotIdle`] if the job is waiting, sleeping or running.
    pub fn set_priority(&self, priority: JobPriority) -> Result<(), SchedulerError> {
        let mut data = self.inner.data.lock();
        if data.state != JobState::None {
            return Err(SchedulerError::JobNotIdle(self.inner.name.clone()));
        }
        data.priority = priority;
        Ok(())
    }

    /// Whether cancellation was requested while the job was running.
    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.inner.cancel_requested.load(Ordering::Acquire)
    }

    pub(crate) fn request_cancel(&self) {
        self.inner.cancel_requested.store(true, Ordering::Release);
    }

    pub(crate) fn clear_cancel(&self) {
        self.inner.cancel_requested.store(false, Ordering::Release);
    }

    pub(crate) fn data(&self) -> MutexGuard<'_, JobData> {
        self.inner.data.lock()
    }

    pub(crate) fn body(&self) -> Arc<dyn JobBody> {
        Arc::clone(&self.inner.body)
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Job {}

impl Hash for Job {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Capabilities handed to a running job body.
pub struct JobContext {
    job: Job,
    rules: RuleContext,
}

impl JobContext {
    pub(crate) const fn new(job: Job, rules: RuleContext) -> Self {
        Self { job, rules }
    }

    /// The job being run.
    #[must_use]
    pub const fn job(&self) -> &Job {
        &self.job
    }

    /// Whether the job was asked to stop. Bodies check this cooperatively.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.job.is_cancel_requested()
    }

    /// Acquire `rule` nested under the job's own rule.
    ///
    /// Rules the job's rule contains are granted without blocking. A job with
    /// no rule acquires through the scheduler like any other caller.
    ///
    /// # Errors
    ///
    /// See [`RuleContext::begin_rule`].
    pub fn begin_rule(&self, rule: RuleRef) -> Result<(), SchedulerError> {
        self.rules.begin_rule(rule)
    }

    /// Release a rule acquired with [`JobContext::begin_rule`].
    ///
    /// # Errors
    ///
    /// See [`RuleContext::end_rule`].
    pub fn end_rule(&self, rule: &RuleRef) -> Result<(), SchedulerError> {
        self.rules.end_rule(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ResourceRule;

    #[test]
    fn test_new_job_is_idle() {
        let job = Job::from_fn("idle", |_| JobResult::Ok);
        assert_eq!(job.state(), JobState::None);
        assert_eq!(job.priority(), JobPriority::Long);
        assert!(job.rule().is_none());
        assert!(job.result().is_none());
    }

    #[test]
    fn test_set_rule_only_while_idle() {
        let job = Job::from_fn("rule", |_| JobResult::Ok);
        job.set_rule(Some(ResourceRule::shared("db"))).unwrap();
        assert!(job.rule().is_some());

        job.data().state = JobState::Waiting;
        let err = job.set_rule(None).unwrap_err();
        assert_eq!(err, SchedulerError::JobNotIdle("rule".into()));
        let err = job.set_priority(JobPriority::Short).unwrap_err();
        assert_eq!(err, SchedulerError::JobNotIdle("rule".into()));
    }

    #[test]
    fn test_priority_order() {
        assert!(JobPriority::Interactive < JobPriority::Short);
        assert!(JobPriority::Build < JobPriority::Decorate);
    }

    #[test]
    fn test_job_identity() {
        let a = Job::from_fn("a", |_| JobResult::Ok);
        let b = Job::from_fn("a", |_| JobResult::Ok);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
