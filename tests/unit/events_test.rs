//! Tests for job change listeners

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use prometheus_rule_scheduler::config::SchedulerConfig;
use prometheus_rule_scheduler::core::{
    Job, JobChangeEvent, JobChangeListener, JobEventKind, JobResult, RecordingListener, Scheduler,
};

struct CountingListener {
    count: AtomicUsize,
}

impl JobChangeListener for CountingListener {
    fn on_event(&self, _event: &JobChangeEvent) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_recording_listener_filters_by_job() {
    let recorder = RecordingListener::new(16);
    let a = Job::from_fn("a", |_| JobResult::Ok);
    let b = Job::from_fn("b", |_| JobResult::Ok);

    let scheduler = Scheduler::new(SchedulerConfig::new().with_worker_count(1)).expect("scheduler");
    scheduler.suspend();
    let recorder = Arc::new(recorder);
    scheduler.add_listener(recorder.clone());
    scheduler.schedule(&a, Duration::ZERO).expect("schedule a");
    scheduler.schedule(&b, Duration::from_secs(60)).expect("schedule b");

    assert_eq!(
        recorder.kinds_for(a.id()),
        vec![JobEventKind::Scheduled { delay: Duration::ZERO }]
    );
    assert_eq!(
        recorder.kinds_for(b.id()),
        vec![
            JobEventKind::Scheduled { delay: Duration::from_secs(60) },
            JobEventKind::Sleeping,
        ]
    );

    recorder.clear();
    assert!(recorder.events().is_empty());
    scheduler.shutdown();
}

#[test]
fn test_removed_listener_stops_receiving() {
    let scheduler = Scheduler::new(SchedulerConfig::new().with_worker_count(1)).expect("scheduler");
    scheduler.suspend();
    let counter = Arc::new(CountingListener {
        count: AtomicUsize::new(0),
    });
    let listener: Arc<dyn JobChangeListener> = counter.clone();
    scheduler.add_listener(listener.clone());

    let job = Job::from_fn("counted", |_| JobResult::Ok);
    scheduler.schedule(&job, Duration::ZERO).expect("schedule");
    assert_eq!(counter.count.load(Ordering::SeqCst), 1);

    scheduler.remove_listener(&listener);
    assert!(scheduler.cancel(&job));
    assert_eq!(counter.count.load(Ordering::SeqCst), 1);
    scheduler.shutdown();
}
