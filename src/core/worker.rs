//! Worker and timer threads.
//!
//! Each worker is a dedicated OS thread with its own single-threaded tokio
//! runtime. Workers block on the dispatch channel; admitted jobs arrive there
//! already holding their rule. Shutdown drops the sender, which unblocks
//! every worker.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver};
use tracing::{debug, error, warn};

use super::job::{Job, JobContext, JobResult};
use super::rule_stack::RuleContext;
use super::scheduler::Shared;

pub(crate) fn spawn_worker(
    worker_id: usize,
    job_rx: Receiver<Job>,
    shared: Arc<Shared>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("{}-{worker_id}", shared.config.thread_name_prefix))
        .stack_size(shared.config.thread_stack_size)
        .spawn(move || {
            debug!(worker_id = worker_id, "Worker thread started");

            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!(
                        worker_id = worker_id,
                        error = %e,
                        "Failed to create worker runtime"
                    );
                    return;
                }
            };

            while let Ok(job) = job_rx.recv() {
                debug!(
                    worker_id = worker_id,
                    job_id = %job.id(),
                    job = job.name(),
                    "Worker running job"
                );

                let body = job.body();
                let ctx = JobContext::new(
                    job.clone(),
                    RuleContext::for_job(Arc::clone(&shared), &job),
                );
                let result = match panic::catch_unwind(AssertUnwindSafe(|| rt.block_on(body.run(ctx)))) {
                    Ok(result) => result,
                    Err(payload) => {
                        let message = panic_message(&*payload);
                        warn!(
                            worker_id = worker_id,
                            job_id = %job.id(),
                            panic = %message,
                            "Job panicked"
                        );
                        JobResult::Error(format!("job panicked: {message}"))
                    }
                };

                shared.finish_job(&job, result);
            }

            debug!(worker_id = worker_id, "Worker channel closed, exiting");
        })
}

pub(crate) fn spawn_timer(shared: Arc<Shared>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("{}-timer", shared.config.thread_name_prefix))
        .spawn(move || shared.run_timer())
}

/// Join a scheduler thread, giving up after `timeout`. An overrunning thread is detached.
pub(crate) fn join_with_timeout(idx: usize, handle: JoinHandle<()>, timeout: Duration) {
    let (tx, rx) = bounded(1);
    let joiner = thread::Builder::new().spawn(move || {
        let _ = tx.send(handle.join().is_ok());
    });
    if let Err(e) = joiner {
        warn!(thread = idx, error = %e, "Could not spawn join helper - detaching thread");
        return;
    }

    match rx.recv_timeout(timeout) {
        Ok(true) => debug!(thread = idx, "Scheduler thread joined"),
        Ok(false) => warn!(thread = idx, "Scheduler thread panicked"),
        Err(_) => warn!(thread = idx, "Scheduler thread did not exit within timeout - detaching"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}
