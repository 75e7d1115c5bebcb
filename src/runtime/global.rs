//! Optional process-wide scheduler.
//!
//! Applications that want one shared job manager install it once at startup
//! and reach it from anywhere with [`global`]. Nothing in the crate requires
//! the global; schedulers can always be created and passed explicitly.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::builders::build_scheduler_from_env;
use crate::core::{AppResult, Scheduler};

static GLOBAL: RwLock<Option<Arc<Scheduler>>> = parking_lot::const_rwlock(None);

/// Install `scheduler` as the process-wide instance.
///
/// # Errors
///
/// Fails if an instance is already installed.
pub fn install(scheduler: Scheduler) -> AppResult<Arc<Scheduler>> {
    let mut slot = GLOBAL.write();
    ensure_vacant(&slot)?;
    Ok(fill(&mut slot, scheduler))
}

/// Build a scheduler from the environment and install it.
///
/// The slot stays locked while the scheduler is built, so concurrent callers
/// never start a scheduler only to discard it.
///
/// # Errors
///
/// Fails if configuration is invalid or an instance is already installed.
pub fn install_from_env() -> AppResult<Arc<Scheduler>> {
    let mut slot = GLOBAL.write();
    ensure_vacant(&slot)?;
    let scheduler = build_scheduler_from_env()?;
    Ok(fill(&mut slot, scheduler))
}

fn ensure_vacant(slot: &Option<Arc<Scheduler>>) -> AppResult<()> {
    if slot.is_some() {
        anyhow::bail!("a global scheduler is already installed");
    }
    Ok(())
}

fn fill(slot: &mut Option<Arc<Scheduler>>, scheduler: Scheduler) -> Arc<Scheduler> {
    let scheduler = Arc::new(scheduler);
    *slot = Some(Arc::clone(&scheduler));
    info!(
        worker_count = scheduler.config().worker_count,
        "Global scheduler installed"
    );
    scheduler
}

/// The installed instance, if any.
#[must_use]
pub fn global() -> Option<Arc<Scheduler>> {
    GLOBAL.read().clone()
}

/// Uninstall and shut down the process-wide instance. Returns `false` if none was installed.
pub fn shutdown_global() -> bool {
    let taken = GLOBAL.write().take();
    match taken {
        Some(scheduler) => {
            scheduler.shutdown();
            true
        }
        None => false,
    }
}
