//! Background recovery of interrupted refund sagas.

use std::sync::Arc;

use chrono::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration as TickDuration, MissedTickBehavior};
use tracing::{error, info};

use crate::handlers::refund::RefundWorkflow;

/// Every `every`, resume sagas that have not moved for at least `grace`.
///
/// The grace period keeps the worker away from sagas whose request is still
/// in flight.
pub fn spawn_recovery_worker(
    workflow: Arc<RefundWorkflow>,
    every: TickDuration,
    grace: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            every_secs = every.as_secs(),
            grace_secs = grace.num_seconds(),
            "Refund recovery worker started"
        );

        loop {
            ticker.tick().await;
            match workflow.resume_pending(grace).await {
                Ok(0) => {}
                Ok(n) => info!(completed = n, "Recovered interrupted refund sagas"),
                Err(e) => error!(error = %e, "Failed to load pending refund sagas"),
            }
        }
    })
}
