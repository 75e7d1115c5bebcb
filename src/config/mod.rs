//! Configuration models for the scheduler and its worker threads.

pub mod scheduler;

pub use scheduler::SchedulerConfig;
