//! Background driver that health-checks every tenant pool on an interval

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::manager::PoolRegistry;

/// Handle to the periodic health check task
///
/// Cancellation is cooperative: a check that is already running finishes
/// before the task exits.
pub(crate) struct HealthCheckDriver {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl HealthCheckDriver {
    /// Spawn the driver. The first check runs one interval after start.
    pub(crate) fn spawn(interval: Duration, registry: Weak<PoolRegistry>) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(interval_ms = interval.as_millis() as u64, "health check driver started");

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let reports = registry.health_check_all().await;
                let evicted: usize = reports.iter().map(|r| r.evicted_total()).sum();
                tracing::debug!(
                    tenants = reports.len(),
                    evicted = evicted,
                    "periodic health check complete"
                );
            }

            tracing::debug!("health check driver stopped");
        });

        Self { cancel, task }
    }

    /// Ask the driver to stop without waiting for it
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Stop the driver and wait for an in-flight check to finish
    pub(crate) async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "health check driver terminated abnormally");
        }
    }
}
