//! Periodic health refresh standing in for external probing.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::admin::Registries;

/// Mark every registered service as checked on each tick until `shutdown`.
pub fn spawn_heartbeat(
    registries: Arc<Registries>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tick.tick() => {
                    registries.record_all_healthy(Utc::now());
                    tracing::debug!(services = registries.services.len(), "health heartbeat");
                }
            }
        }
        tracing::debug!("health heartbeat stopped");
    })
}
