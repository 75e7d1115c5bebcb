//! The job manager: waiting queue, rule ledger, admission loop and
//! synchronous rule acquisition.
//!
//! # Locking
//!
//! All bookkeeping (queues, ledger, rule stacks, running set) sits behind one
//! `parking_lot::Mutex`. Every change that could free a rule or make a job
//! admissible goes through [`Shared::update`], which reruns admission and
//! signals the single `Condvar` before releasing the lock, so callers blocked
//! in `begin_rule` or `join` cannot miss a wake-up. Job bodies and listeners
//! run outside the lock.
//!
//! # Hazards
//!
//! A job whose rule conflicts with something that is never released waits
//! forever. The scheduler does not detect this: releasing a thread's rule
//! from that same thread after joining a conflicting job, or a job body
//! acquiring a rule that conflicts with its own, deadlocks by construction.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Sender};
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::builders::SchedulerBuilder;
use crate::config::SchedulerConfig;

use super::events::{JobChangeEvent, JobChangeListener, JobEventKind, JobListeners};
use super::job::{Job, JobId, JobResult, JobState};
use super::ledger::{RuleHolder, RuleLedger};
use super::queue::{SleepKey, SleepQueue, WaitKey, WaitQueue, WakeAt};
use super::rule::{validate_rule, RuleRef};
use super::rule_stack::{RuleContext, RuleStack};
use super::stats::{SchedulerCounters, SchedulerStats};
use super::worker::{join_with_timeout, spawn_timer, spawn_worker};
use super::SchedulerError;

/// Bookkeeping guarded by the global lock.
pub(crate) struct SchedulerState {
    active: bool,
    suspended: bool,
    waiting: WaitQueue,
    sleeping: SleepQueue,
    running: HashMap<JobId, Job>,
    ledger: RuleLedger,
    stacks: HashMap<RuleHolder, RuleStack>,
    next_stamp: u64,
    dispatch: Option<Sender<Job>>,
    counters: SchedulerCounters,
    /// Events not yet delivered, in the order they happened.
    events: Vec<JobChangeEvent>,
    /// Set while one thread is delivering events outside the lock.
    delivering: bool,
}

impl SchedulerState {
    fn new(dispatch: Sender<Job>) -> Self {
        Self {
            active: true,
            suspended: false,
            waiting: WaitQueue::new(),
            sleeping: SleepQueue::new(),
            running: HashMap::new(),
            ledger: RuleLedger::new(),
            stacks: HashMap::new(),
            next_stamp: 0,
            dispatch: Some(dispatch),
            counters: SchedulerCounters::default(),
            events: Vec::new(),
            delivering: false,
        }
    }

    fn take_stamp(&mut self) -> u64 {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        stamp
    }

    fn emit(&mut self, job: &Job, kind: JobEventKind) {
        self.events.push(JobChangeEvent::new(job, kind));
    }

    fn enqueue_waiting(&mut self, job: &Job) {
        let stamp = self.take_stamp();
        let priority = {
            let mut data = job.data();
            data.state = JobState::Waiting;
            data.stamp = stamp;
            data.priority
        };
        self.waiting.insert(WaitKey { priority, stamp }, job.clone());
    }

    fn park(&mut self, job: &Job, wake_at: WakeAt) {
        let stamp = self.take_stamp();
        {
            let mut data = job.data();
            data.state = JobState::Sleeping;
            data.stamp = stamp;
        }
        self.sleeping.insert(SleepKey { wake_at, stamp }, job.clone());
    }

    fn enqueue_sleeping(&mut self, job: &Job, wake_at: WakeAt) {
        self.park(job, wake_at);
        self.emit(job, JobEventKind::Sleeping);
    }

    /// Move an idle job into the waiting or sleeping queue.
    fn schedule_idle(&mut self, job: &Job, delay: Duration) {
        job.clear_cancel();
        self.counters.scheduled += 1;
        self.emit(job, JobEventKind::Scheduled { delay });
        match Instant::now().checked_add(delay) {
            _ if delay.is_zero() => self.enqueue_waiting(job),
            Some(at) => self.enqueue_sleeping(job, WakeAt::At(at)),
            None => self.enqueue_sleeping(job, WakeAt::Never),
        }
        debug!(job_id = %job.id(), job = job.name(), ?delay, "Job scheduled");
    }

    /// Move every sleeper whose wake time has passed to the waiting queue.
    fn wake_due_sleepers(&mut self, now: Instant) -> bool {
        let mut woke = false;
        while let Some(key) = self.sleeping.first_key() {
            if key.wake_at > WakeAt::At(now) {
                break;
            }
            let Some(job) = self.sleeping.remove_key(&key) else {
                break;
            };
            self.enqueue_waiting(&job);
            self.emit(&job, JobEventKind::Awake);
            woke = true;
        }
        woke
    }

    fn next_wake(&self) -> Option<Instant> {
        match self.sleeping.first_key()?.wake_at {
            WakeAt::At(at) => Some(at),
            WakeAt::Never => None,
        }
    }

    /// Finish a job that was removed from a queue before it ran.
    fn cancel_queued(&mut self, job: &Job) {
        {
            let mut data = job.data();
            data.state = JobState::None;
            data.result = Some(JobResult::Canceled);
            data.reschedule = None;
        }
        self.counters.canceled += 1;
        self.emit(
            job,
            JobEventKind::Done {
                result: JobResult::Canceled,
                rescheduled: false,
            },
        );
    }

    /// Remove a running job's ledger entry and return it to idle, rescheduling if asked.
    fn finish(&mut self, job: &Job, result: JobResult) {
        let id = job.id();
        self.running.remove(&id);
        if self.ledger.remove(&RuleHolder::Job(id)).is_some() {
            debug!(job_id = %id, "Job rule released");
        }
        self.discard_job_stacks(id);
        let reschedule = {
            let mut data = job.data();
            data.state = JobState::None;
            data.result = Some(result.clone());
            data.reschedule.take()
        };
        match &result {
            JobResult::Ok => self.counters.completed += 1,
            JobResult::Error(_) => self.counters.failed += 1,
            JobResult::Canceled => self.counters.canceled += 1,
        }
        let reschedule = reschedule.filter(|_| self.active);
        self.emit(
            job,
            JobEventKind::Done {
                result,
                rescheduled: reschedule.is_some(),
            },
        );
        if let Some(delay) = reschedule {
            self.schedule_idle(job, delay);
        }
    }

    /// Drop the rule stacks of a finished run, with any ledger entry they hold.
    fn discard_job_stacks(&mut self, job: JobId) {
        let holders: Vec<RuleHolder> = self
            .stacks
            .iter()
            .filter(|(_, stack)| stack.is_owned_by(job))
            .map(|(holder, _)| *holder)
            .collect();
        for holder in holders {
            if let Some(stack) = self.stacks.remove(&holder) {
                if !stack.is_empty() {
                    warn!(job_id = %job, %holder, depth = stack.depth(), "Job context outlived its run while holding rules");
                }
            }
            self.ledger.remove(&holder);
        }
    }

    fn prune_stack(&mut self, holder: RuleHolder) {
        if self.stacks.get(&holder).is_some_and(RuleStack::is_disposable) {
            self.stacks.remove(&holder);
        }
    }
}

/// State shared by the scheduler handle, its worker threads and rule contexts.
pub(crate) struct Shared {
    pub(crate) config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    changed: Condvar,
    listeners: JobListeners,
}

impl Shared {
    fn new(config: SchedulerConfig, dispatch: Sender<Job>) -> Self {
        Self {
            config,
            state: Mutex::new(SchedulerState::new(dispatch)),
            changed: Condvar::new(),
            listeners: JobListeners::default(),
        }
    }

    /// Apply `f` under the global lock, rerun admission and wake every waiter,
    /// then deliver the resulting events outside the lock.
    fn update<R>(&self, f: impl FnOnce(&mut SchedulerState) -> R) -> R {
        let mut state = self.state.lock();
        let result = f(&mut state);
        self.admit(&mut state);
        self.changed.notify_all();
        self.flush_events(&mut state);
        result
    }

    /// Deliver pending events with the lock released.
    ///
    /// One thread delivers at a time and drains the queue until it is empty,
    /// so listeners see events in the order they happened. A thread that finds
    /// delivery in progress leaves its events to the deliverer; this includes
    /// listeners calling back into the scheduler.
    fn flush_events(&self, state: &mut MutexGuard<'_, SchedulerState>) {
        if state.delivering {
            return;
        }
        state.delivering = true;
        loop {
            let batch = std::mem::take(&mut state.events);
            if batch.is_empty() {
                break;
            }
            MutexGuard::unlocked(state, || self.listeners.notify(&batch));
        }
        state.delivering = false;
    }

    /// Admission pass.
    ///
    /// Waiting jobs are visited in priority then FIFO order. A job is admitted
    /// when its rule conflicts with nothing in the ledger; its rule enters the
    /// ledger immediately, so jobs admitted later in the same pass are checked
    /// against it too. At most one running job per worker thread.
    fn admit(&self, state: &mut SchedulerState) {
        if !state.active {
            return;
        }
        state.wake_due_sleepers(Instant::now());
        if state.suspended {
            return;
        }
        let capacity = self.config.worker_count.saturating_sub(state.running.len());
        if capacity == 0 || state.waiting.is_empty() {
            return;
        }

        let mut admitted = Vec::new();
        for (key, job) in state.waiting.iter() {
            if admitted.len() == capacity {
                break;
            }
            if let Some(rule) = job.rule() {
                if let Some(blocker) = state.ledger.find_conflict(rule.as_ref()) {
                    debug!(job_id = %job.id(), %blocker, "Job blocked by held rule");
                    continue;
                }
                state.ledger.insert(RuleHolder::Job(job.id()), rule);
            }
            admitted.push(*key);
        }

        for key in admitted {
            let Some(job) = state.waiting.remove_key(&key) else {
                continue;
            };
            job.data().state = JobState::Running;
            state.running.insert(job.id(), job.clone());
            state.emit(&job, JobEventKind::Running);
            debug!(job_id = %job.id(), job = job.name(), "Job admitted");

            let sent = state
                .dispatch
                .as_ref()
                .is_some_and(|tx| tx.send(job.clone()).is_ok());
            if !sent {
                warn!(job_id = %job.id(), "No worker available for admitted job");
                state.finish(&job, JobResult::Error("worker pool unavailable".into()));
            }
        }
    }

    pub(crate) fn schedule(&self, job: &Job, delay: Duration) -> Result<(), SchedulerError> {
        self.update(|state| {
            if !state.active {
                return Err(SchedulerError::ShutDown);
            }
            match job.state() {
                JobState::None => state.schedule_idle(job, delay),
                JobState::Running => {
                    job.data().reschedule = Some(delay);
                    debug!(job_id = %job.id(), ?delay, "Running job marked for reschedule");
                }
                JobState::Waiting | JobState::Sleeping => {}
            }
            Ok(())
        })
    }

    pub(crate) fn cancel(&self, job: &Job) -> bool {
        let id = job.id();
        self.update(|state| match job.state() {
            JobState::Waiting if state.waiting.remove(&id).is_some() => {
                state.cancel_queued(job);
                debug!(job_id = %id, "Waiting job canceled");
                true
            }
            JobState::Sleeping if state.sleeping.remove(&id).is_some() => {
                state.cancel_queued(job);
                debug!(job_id = %id, "Sleeping job canceled");
                true
            }
            JobState::Running if state.running.contains_key(&id) => {
                job.request_cancel();
                job.data().reschedule = None;
                debug!(job_id = %id, "Cancellation requested for running job");
                false
            }
            _ => false,
        })
    }

    pub(crate) fn sleep(&self, job: &Job) -> bool {
        let id = job.id();
        self.update(|state| match job.state() {
            JobState::Running => false,
            JobState::Waiting => {
                if state.waiting.remove(&id).is_some() {
                    state.enqueue_sleeping(job, WakeAt::Never);
                }
                true
            }
            JobState::Sleeping => {
                if state.sleeping.remove(&id).is_some() {
                    state.enqueue_sleeping(job, WakeAt::Never);
                }
                true
            }
            JobState::None => true,
        })
    }

    pub(crate) fn wake_up(&self, job: &Job, delay: Duration) {
        let id = job.id();
        self.update(|state| {
            if job.state() != JobState::Sleeping || state.sleeping.remove(&id).is_none() {
                return;
            }
            match Instant::now().checked_add(delay) {
                _ if delay.is_zero() => {
                    state.enqueue_waiting(job);
                    state.emit(job, JobEventKind::Awake);
                }
                Some(at) => state.park(job, WakeAt::At(at)),
                None => state.park(job, WakeAt::Never),
            }
        });
    }

    pub(crate) fn finish_job(&self, job: &Job, result: JobResult) {
        debug!(job_id = %job.id(), job = job.name(), ?result, "Job finished");
        self.update(|state| state.finish(job, result));
    }

    /// Acquire `rule` for `holder`, blocking until it conflicts with nothing held.
    pub(crate) fn begin_rule(&self, holder: RuleHolder, rule: RuleRef) -> Result<(), SchedulerError> {
        validate_rule(rule.as_ref())?;
        let mut state = self.state.lock();
        // Re-read the holder's stack after every wait. It may have gained a
        // frame from another thread sharing the context, or been discarded.
        let acquires = loop {
            if !state.active {
                state.prune_stack(holder);
                return Err(SchedulerError::ShutDown);
            }
            let stack = state.stacks.entry(holder).or_default();
            if let Err(err) = stack.check_nesting(rule.as_ref()) {
                warn!(%holder, error = %err, "Rejected rule nesting");
                state.prune_stack(holder);
                return Err(err);
            }
            if !stack.acquires_on_push() {
                break false;
            }
            match state.ledger.find_conflict(rule.as_ref()) {
                None => {
                    state.ledger.insert(holder, Arc::clone(&rule));
                    break true;
                }
                Some(blocker) => {
                    debug!(%holder, %blocker, "Waiting for conflicting rule");
                    self.changed.wait(&mut state);
                }
            }
        };

        debug!(%holder, ?rule, nested = !acquires, "Rule acquired");
        state.stacks.entry(holder).or_default().push(rule);
        Ok(())
    }

    /// Release `rule`, which must be the top of `holder`'s stack.
    pub(crate) fn end_rule(&self, holder: RuleHolder, rule: &RuleRef) -> Result<(), SchedulerError> {
        self.update(|state| {
            let Some(stack) = state.stacks.get_mut(&holder) else {
                return Err(SchedulerError::RuleNotHeld(format!("{rule:?}")));
            };
            if let Err(err) = stack.check_release(rule.as_ref()) {
                warn!(%holder, error = %err, "Rejected rule release");
                return Err(err);
            }
            let releases = stack.releases_on_pop();
            stack.pop();
            state.prune_stack(holder);
            if releases {
                state.ledger.remove(&holder);
            }
            debug!(%holder, ?rule, released = releases, "Rule ended");
            Ok(())
        })
    }

    pub(crate) fn register_stack(&self, holder: RuleHolder, stack: RuleStack) {
        self.state.lock().stacks.insert(holder, stack);
    }

    pub(crate) fn stack_depth(&self, holder: RuleHolder) -> usize {
        self.state
            .lock()
            .stacks
            .get(&holder)
            .map_or(0, RuleStack::depth)
    }

    /// Forget `holder`'s stack, releasing its ledger entry if it still has one.
    pub(crate) fn release_stack(&self, holder: RuleHolder) {
        self.update(|state| {
            if let Some(stack) = state.stacks.remove(&holder) {
                if !stack.is_empty() {
                    warn!(%holder, depth = stack.depth(), "Rule context dropped while holding rules");
                }
            }
            if state.ledger.remove(&holder).is_some() {
                debug!(%holder, "Released rule of dropped context");
            }
        });
    }

    /// Wait until `job` is idle. `None` waits indefinitely.
    pub(crate) fn join_timeout(&self, job: &Job, timeout: Option<Duration>) -> bool {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut state = self.state.lock();
        loop {
            if job.state() == JobState::None {
                return true;
            }
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out() {
                        return job.state() == JobState::None;
                    }
                }
                None => self.changed.wait(&mut state),
            }
        }
    }

    /// Timer loop: wakes sleepers when their time comes and reruns admission.
    pub(crate) fn run_timer(&self) {
        let mut state = self.state.lock();
        while state.active {
            if state.wake_due_sleepers(Instant::now()) {
                self.admit(&mut state);
                self.changed.notify_all();
                self.flush_events(&mut state);
                continue;
            }
            match state.next_wake() {
                Some(at) => {
                    let _ = self.changed.wait_until(&mut state, at);
                }
                None => self.changed.wait(&mut state),
            }
        }
        debug!("Timer thread exiting");
    }

    /// Stop accepting work and cancel queued jobs. Returns `false` if already shut down.
    pub(crate) fn begin_shutdown(&self) -> bool {
        self.update(|state| {
            if !state.active {
                return false;
            }
            state.active = false;
            state.dispatch = None;
            let queued: Vec<Job> = state
                .waiting
                .drain()
                .into_iter()
                .chain(state.sleeping.drain())
                .collect();
            for job in &queued {
                state.cancel_queued(job);
            }
            for job in state.running.values() {
                job.request_cancel();
                job.data().reschedule = None;
            }
            true
        })
    }
}

/// Rule-based mutual-exclusion job scheduler.
///
/// Runs jobs on a fixed pool of worker threads while guaranteeing that jobs
/// whose rules conflict never run at the same time, and lets callers acquire
/// rules synchronously with [`Scheduler::begin_rule`] / [`Scheduler::end_rule`]
/// or through a [`RuleContext`]. Both paths share one ledger.
///
/// # Example
///
/// ```rust,ignore
/// use std::time::Duration;
/// use prometheus_rule_scheduler::config::SchedulerConfig;
/// use prometheus_rule_scheduler::core::{Job, JobResult, ResourceRule, Scheduler};
///
/// let scheduler = Scheduler::new(SchedulerConfig::new().with_worker_count(4))?;
/// let job = Job::from_fn("index", |_| JobResult::Ok)
///     .with_rule(ResourceRule::shared("index"))?;
/// scheduler.schedule(&job, Duration::ZERO)?;
/// scheduler.join(&job);
/// scheduler.shutdown();
/// ```
pub struct Scheduler {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Start a scheduler with `config.worker_count` worker threads and a timer thread.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if the configuration is invalid
    /// or a thread cannot be spawned.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        Self::with_listeners(config, Vec::new())
    }

    /// Builder with default configuration.
    #[must_use]
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    pub(crate) fn with_listeners(
        config: SchedulerConfig,
        listeners: Vec<Arc<dyn JobChangeListener>>,
    ) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let (task_tx, task_rx) = unbounded::<Job>();
        let shared = Arc::new(Shared::new(config, task_tx));
        for listener in listeners {
            shared.listeners.add(listener);
        }

        let worker_count = shared.config.worker_count;
        let mut threads = Vec::with_capacity(worker_count + 1);
        for worker_id in 0..worker_count {
            let handle = spawn_worker(worker_id, task_rx.clone(), Arc::clone(&shared))
                .map_err(|e| spawn_failed(&shared, &e))?;
            threads.push(handle);
        }
        threads.push(spawn_timer(Arc::clone(&shared)).map_err(|e| spawn_failed(&shared, &e))?);

        info!(
            worker_count = worker_count,
            thread_prefix = %shared.config.thread_name_prefix,
            "Scheduler started"
        );

        Ok(Self {
            shared,
            threads: Mutex::new(threads),
        })
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Queue `job`. Never blocks.
    ///
    /// A zero `delay` makes the job ready now; otherwise it sleeps until the
    /// delay elapses. Scheduling a waiting or sleeping job does nothing;
    /// scheduling a running job runs it again with `delay` once it finishes.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::ShutDown`] after shutdown.
    pub fn schedule(&self, job: &Job, delay: Duration) -> Result<(), SchedulerError> {
        self.shared.schedule(job, delay)
    }

    /// Remove a waiting or sleeping job from its queue, finishing it as canceled.
    ///
    /// Returns `false` if the job is running (its cancel flag is set for the
    /// body to observe) or idle.
    pub fn cancel(&self, job: &Job) -> bool {
        self.shared.cancel(job)
    }

    /// Put a waiting job to sleep until [`Scheduler::wake_up`].
    ///
    /// Returns `false` only if the job is already running.
    pub fn sleep(&self, job: &Job) -> bool {
        self.shared.sleep(job)
    }

    /// Wake a sleeping job after `delay`. Does nothing for jobs that are not sleeping.
    pub fn wake_up(&self, job: &Job, delay: Duration) {
        self.shared.wake_up(job, delay);
    }

    /// Acquire `rule` on the calling thread, blocking until it conflicts with
    /// nothing held by a running job or another caller.
    ///
    /// While the thread already holds a rule, `rule` must be contained by the
    /// innermost held rule; such nested calls never block.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidNesting`] if the held rule does not contain `rule`;
    ///   nothing changes
    /// - [`SchedulerError::InvalidRule`] if `rule` breaks the rule contract
    /// - [`SchedulerError::ShutDown`] after shutdown
    pub fn begin_rule(&self, rule: RuleRef) -> Result<(), SchedulerError> {
        self.shared.begin_rule(current_thread_holder(), rule)
    }

    /// Release the calling thread's innermost rule, which must be `rule`.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::MismatchedRelease`] if `rule` is not the innermost
    ///   rule; nothing changes
    /// - [`SchedulerError::RuleNotHeld`] if the thread holds no rule
    pub fn end_rule(&self, rule: &RuleRef) -> Result<(), SchedulerError> {
        self.shared.end_rule(current_thread_holder(), rule)
    }

    /// New explicit acquisition context with an empty stack.
    #[must_use]
    pub fn rule_context(&self) -> RuleContext {
        RuleContext::new(Arc::clone(&self.shared))
    }

    /// Stop admitting jobs. Synchronous rule acquisition is unaffected.
    pub fn suspend(&self) {
        self.shared.update(|state| state.suspended = true);
        debug!("Scheduler suspended");
    }

    /// Resume admitting jobs.
    pub fn resume(&self) {
        self.shared.update(|state| state.suspended = false);
        debug!("Scheduler resumed");
    }

    /// Whether admission is suspended.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.shared.state.lock().suspended
    }

    /// Whether no job is running or waiting.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let state = self.shared.state.lock();
        state.running.is_empty() && state.waiting.is_empty()
    }

    /// Whether the scheduler still accepts work.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.state.lock().active
    }

    /// State of `job`, read under the scheduler lock.
    #[must_use]
    pub fn job_state(&self, job: &Job) -> JobState {
        let _state = self.shared.state.lock();
        job.state()
    }

    /// Block until `job` is idle.
    pub fn join(&self, job: &Job) {
        self.shared.join_timeout(job, None);
    }

    /// Block until `job` is idle or `timeout` elapses. Returns whether it is idle.
    #[must_use]
    pub fn join_timeout(&self, job: &Job, timeout: Duration) -> bool {
        self.shared.join_timeout(job, Some(timeout))
    }

    /// Wait for `job` to become idle from an async context.
    ///
    /// The blocking wait is moved to tokio's blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Timeout`] if the job is still scheduled after `timeout`.
    pub async fn join_async(&self, job: &Job, timeout: Duration) -> Result<(), SchedulerError> {
        let shared = Arc::clone(&self.shared);
        let job = job.clone();
        let idle = tokio::task::spawn_blocking(move || shared.join_timeout(&job, Some(timeout)))
            .await
            .unwrap_or(false);
        if idle {
            Ok(())
        } else {
            Err(SchedulerError::Timeout)
        }
    }

    /// Snapshot of every ledger entry.
    #[must_use]
    pub fn held_rules(&self) -> Vec<(RuleHolder, RuleRef)> {
        self.shared.state.lock().ledger.snapshot()
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let state = self.shared.state.lock();
        let mut stats = SchedulerStats {
            worker_count: self.shared.config.worker_count,
            running_jobs: state.running.len(),
            waiting_jobs: state.waiting.len(),
            sleeping_jobs: state.sleeping.len(),
            held_rules: state.ledger.len(),
            ..SchedulerStats::default()
        };
        state.counters.apply(&mut stats);
        stats
    }

    /// Register a job change listener.
    pub fn add_listener(&self, listener: Arc<dyn JobChangeListener>) {
        self.shared.listeners.add(listener);
    }

    /// Unregister a listener previously added.
    pub fn remove_listener(&self, listener: &Arc<dyn JobChangeListener>) {
        self.shared.listeners.remove(listener);
    }

    /// Shut down: cancel queued jobs, ask running jobs to stop, wake blocked
    /// callers, and join the threads with the configured per-thread timeout.
    ///
    /// Threads that overrun the timeout are detached.
    pub fn shutdown(&self) {
        if !self.shared.begin_shutdown() {
            return;
        }
        info!("Shutting down scheduler");

        let timeout = Duration::from_millis(self.shared.config.shutdown_timeout_ms);
        let threads: Vec<_> = self.threads.lock().drain(..).collect();
        let thread_count = threads.len();
        for (idx, handle) in threads.into_iter().enumerate() {
            join_with_timeout(idx, handle, timeout);
        }

        info!(thread_count = thread_count, "Scheduler shut down complete");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Threads exit on their own once shutdown is signaled; explicit
        // shutdown() is required to join them.
        if self.shared.begin_shutdown() {
            debug!("Scheduler dropped without explicit shutdown - threads will be detached");
        }
    }
}

fn current_thread_holder() -> RuleHolder {
    RuleHolder::Thread(thread::current().id())
}

fn spawn_failed(shared: &Shared, err: &std::io::Error) -> SchedulerError {
    shared.begin_shutdown();
    SchedulerError::InvalidConfig(format!("failed to spawn scheduler thread: {err}"))
}
