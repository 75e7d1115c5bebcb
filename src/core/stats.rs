//! Scheduler statistics.

use serde::{Deserialize, Serialize};

/// Statistics about scheduler utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Number of worker threads.
    pub worker_count: usize,

    /// Jobs admitted and not yet finished.
    pub running_jobs: usize,

    /// Jobs in the waiting queue.
    pub waiting_jobs: usize,

    /// Jobs in the sleeping queue.
    pub sleeping_jobs: usize,

    /// Entries in the rule ledger (running jobs with rules plus synchronous holders).
    pub held_rules: usize,

    /// Total schedule requests accepted from the idle state.
    pub scheduled_jobs: u64,

    /// Total runs that finished with `Ok`.
    pub completed_jobs: u64,

    /// Total runs that finished with an error.
    pub failed_jobs: u64,

    /// Total jobs canceled, before or during their run.
    pub canceled_jobs: u64,
}

/// Running totals kept under the scheduler lock.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SchedulerCounters {
    pub(crate) scheduled: u64,
    pub(crate) completed: u64,
    pub(crate) failed: u64,
    pub(crate) canceled: u64,
}

impl SchedulerCounters {
    /// Fill the totals part of a stats snapshot.
    pub(crate) const fn apply(&self, stats: &mut SchedulerStats) {
        stats.scheduled_jobs = self.scheduled;
        stats.completed_jobs = self.completed;
        stats.failed_jobs = self.failed;
        stats.canceled_jobs = self.canceled;
    }
}
