//! Process-wide scheduler instance.

pub mod global;

pub use global::{global, install, install_from_env, shutdown_global};
