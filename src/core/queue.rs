//! Job queues: the waiting queue ordered for admission and the sleeping queue
//! ordered by wake time.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use super::job::{Job, JobId, JobPriority};

/// Waiting queue order: priority class first, then arrival stamp (FIFO).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct WaitKey {
    pub(crate) priority: JobPriority,
    pub(crate) stamp: u64,
}

/// When a sleeping job wakes. `Never` sorts after every instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum WakeAt {
    At(Instant),
    Never,
}

/// Sleeping queue order: wake time, then stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct SleepKey {
    pub(crate) wake_at: WakeAt,
    pub(crate) stamp: u64,
}

/// Ordered job queue with O(log n) insert, removal by id, and in-order iteration.
pub(crate) struct JobQueue<K> {
    order: BTreeMap<K, Job>,
    index: HashMap<JobId, K>,
}

pub(crate) type WaitQueue = JobQueue<WaitKey>;
pub(crate) type SleepQueue = JobQueue<SleepKey>;

impl<K: Ord + Copy> JobQueue<K> {
    pub(crate) fn new() -> Self {
        Self {
            order: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, key: K, job: Job) {
        if let Some(old) = self.index.insert(job.id(), key) {
            self.order.remove(&old);
        }
        self.order.insert(key, job);
    }

    pub(crate) fn remove(&mut self, id: &JobId) -> Option<Job> {
        let key = self.index.remove(id)?;
        self.order.remove(&key)
    }

    pub(crate) fn remove_key(&mut self, key: &K) -> Option<Job> {
        let job = self.order.remove(key)?;
        self.index.remove(&job.id());
        Some(job)
    }

    pub(crate) fn first_key(&self) -> Option<K> {
        self.order.keys().next().copied()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&K, &Job)> {
        self.order.iter()
    }

    pub(crate) fn drain(&mut self) -> Vec<Job> {
        self.index.clear();
        std::mem::take(&mut self.order).into_values().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
