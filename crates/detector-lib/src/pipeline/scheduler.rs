//! Fixed-cadence scheduling of evaluation runs
//!
//! Runs fire on wall-clock boundaries of the cadence (every quarter hour by
//! default), so consecutive runs line up with the 15-minute buckets of the
//! source. Retries are left to the next tick.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::EvaluationRunner;
use crate::health::{components, HealthRegistry};

/// Default run cadence (15 minutes)
pub const DEFAULT_CADENCE: Duration = Duration::from_secs(15 * 60);

/// Next multiple of `cadence` (since the Unix epoch) strictly after `now`
pub fn next_boundary(now: DateTime<Utc>, cadence: Duration) -> DateTime<Utc> {
    let step = cadence.as_secs().max(1) as i64;
    let next = (now.timestamp().div_euclid(step) + 1) * step;
    Utc.timestamp_opt(next, 0).single().unwrap_or(now)
}

/// Boundary after the one just served
///
/// Advances from `scheduled` even when the timer woke before it, and skips
/// boundaries already passed while a run was in progress.
pub fn following_boundary(
    scheduled: DateTime<Utc>,
    now: DateTime<Utc>,
    cadence: Duration,
) -> DateTime<Utc> {
    next_boundary(scheduled.max(now), cadence)
}

/// Drives an [`EvaluationRunner`] on a fixed cadence until shutdown
pub struct RunScheduler {
    runner: Arc<EvaluationRunner>,
    cadence: Duration,
    run_on_start: bool,
    health: Option<HealthRegistry>,
}

impl RunScheduler {
    pub fn new(runner: Arc<EvaluationRunner>, cadence: Duration) -> Self {
        Self {
            runner,
            cadence,
            run_on_start: false,
            health: None,
        }
    }

    /// Also run immediately instead of waiting for the first boundary
    pub fn with_run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }

    pub fn with_health(mut self, registry: HealthRegistry) -> Self {
        self.health = Some(registry);
        self
    }

    /// Run the scheduling loop
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            cadence_secs = self.cadence.as_secs(),
            run_on_start = self.run_on_start,
            "Starting evaluation scheduler"
        );

        if let Some(ref health) = self.health {
            health.set_healthy(components::SCHEDULER).await;
        }

        if self.run_on_start {
            self.tick().await;
        }

        let mut next = next_boundary(Utc::now(), self.cadence);
        loop {
            let delay = (next - Utc::now()).to_std().unwrap_or_default();
            debug!(next_run = %next.to_rfc3339(), delay_secs = delay.as_secs(), "Waiting for next run");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    self.tick().await;
                    next = following_boundary(next, Utc::now(), self.cadence);
                }
                _ = shutdown.recv() => {
                    info!("Shutting down evaluation scheduler");
                    break;
                }
            }
        }

        if let Some(ref health) = self.health {
            health
                .set_degraded(components::SCHEDULER, "Scheduler stopped")
                .await;
        }
    }

    async fn tick(&self) {
        match self.runner.run_once().await {
            Ok(summary) => {
                debug!(
                    anomalies = summary.anomalies(),
                    failures = summary.failures(),
                    "Scheduled run complete"
                );
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Scheduled run failed, retrying at next boundary");
            }
        }
    }
}
