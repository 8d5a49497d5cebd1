//! Real-time pump for the virtual scheduler.

use std::time::Duration;

use tracing::trace;

use sluice_core::Scheduler;

/// Sleep until each pending deadline and fire it, until no timers remain.
///
/// The engine itself is clock-agnostic; this maps virtual deadlines onto
/// `tokio::time` for real-time callers. Dispatches arriving between sleeps
/// are picked up on the next iteration. Deterministic tests should drive
/// the scheduler's virtual clock directly instead.
pub async fn run_until_idle(scheduler: &Scheduler) {
    while let Some(deadline) = scheduler.next_deadline() {
        let now = scheduler.now();
        if deadline > now {
            trace!(now, deadline, "sleeping until next deadline");
            tokio::time::sleep(Duration::from_millis(deadline - now)).await;
        }
        scheduler.advance_to(deadline);
    }
}
