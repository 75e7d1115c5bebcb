//! Job change events and listeners.
//!
//! Events are delivered after the scheduler's lock is released, so listeners
//! may call back into the scheduler.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use super::job::{Job, JobId, JobResult};

/// What happened to a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEventKind {
    /// The job was scheduled with the given delay.
    Scheduled {
        /// Requested delay.
        delay: Duration,
    },
    /// The job entered the sleeping queue.
    Sleeping,
    /// A sleeping job moved to the waiting queue.
    Awake,
    /// The job was admitted and handed to a worker.
    Running,
    /// The job finished, or was canceled before running.
    Done {
        /// Outcome of the run.
        result: JobResult,
        /// Whether it was scheduled again.
        rescheduled: bool,
    },
}

/// A job state change.
#[derive(Debug, Clone)]
pub struct JobChangeEvent {
    /// The affected job.
    pub job: Job,
    /// What happened.
    pub kind: JobEventKind,
    /// When it happened.
    pub at: Instant,
}

impl JobChangeEvent {
    pub(crate) fn new(job: &Job, kind: JobEventKind) -> Self {
        Self {
            job: job.clone(),
            kind,
            at: Instant::now(),
        }
    }
}

/// Observer of job state changes.
pub trait JobChangeListener: Send + Sync {
    /// Called once per event, outside the scheduler lock.
    fn on_event(&self, event: &JobChangeEvent);
}

/// In-memory listener for testing and dev, keeping the most recent events.
pub struct RecordingListener {
    events: Mutex<VecDeque<JobChangeEvent>>,
    max_events: usize,
}

impl RecordingListener {
    /// Create a listener with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        }
    }

    /// Snapshot of stored events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<JobChangeEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Event kinds recorded for one job, oldest first.
    #[must_use]
    pub fn kinds_for(&self, id: JobId) -> Vec<JobEventKind> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.job.id() == id)
            .map(|e| e.kind.clone())
            .collect()
    }

    /// Forget all stored events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl JobChangeListener for RecordingListener {
    fn on_event(&self, event: &JobChangeEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event.clone());
    }
}

/// Registered listeners.
#[derive(Default)]
pub(crate) struct JobListeners {
    listeners: RwLock<Vec<Arc<dyn JobChangeListener>>>,
}

impl JobListeners {
    pub(crate) fn add(&self, listener: Arc<dyn JobChangeListener>) {
        self.listeners.write().push(listener);
    }

    pub(crate) fn remove(&self, listener: &Arc<dyn JobChangeListener>) {
        self.listeners.write().retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Deliver `events` in order. A panicking listener is logged and skipped.
    pub(crate) fn notify(&self, events: &[JobChangeEvent]) {
        if events.is_empty() {
            return;
        }
        let listeners = self.listeners.read().clone();
        for event in events {
            for listener in &listeners {
                if panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))).is_err() {
                    tracing::warn!(job_id = %event.job.id(), "job change listener panicked");
                }
            }
        }
    }
}
