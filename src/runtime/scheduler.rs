//! Scheduled correction and consistency loops.
//!
//! Two loops run against one engine: a corrector loop that runs the penalty
//! expiry check followed by the waitlist bump pass, and a consistency loop
//! that reconciles pool counters. Both passes are also safe to call
//! manually; the loops only give them a cadence. Shutdown is signalled
//! through a watch channel so both loops stop between ticks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant};

use crate::core::{AdmissionEngine, EligibilitySource, PaymentGateway};

use super::Spawn;

/// Handle to running correction loops.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
}

impl SchedulerHandle {
    /// Stop both loops at their next tick or immediately if idle.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Starts the correction loops for one engine.
pub struct Scheduler;

impl Scheduler {
    /// Spawn the corrector and consistency loops at the intervals from the
    /// engine's configuration.
    pub fn start<E, G, S>(engine: Arc<AdmissionEngine<E, G>>, spawner: &S) -> SchedulerHandle
    where
        E: EligibilitySource,
        G: PaymentGateway,
        S: Spawn,
    {
        let (tx, rx) = watch::channel(false);

        let corrector_interval = Duration::from_secs(engine.config().bump_interval_secs);
        let consistency_interval = Duration::from_secs(engine.config().consistency_interval_secs);

        let corrector_engine = Arc::clone(&engine);
        let mut corrector_shutdown = rx.clone();
        spawner.spawn(async move {
            let mut ticker = interval_at(
                Instant::now() + corrector_interval,
                corrector_interval,
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let restored = corrector_engine.run_penalty_expiry_check().await;
                        let bumped = corrector_engine.run_waitlist_bump().await;
                        tracing::debug!(
                            restored = restored.admissions.len(),
                            bumped = bumped.admissions.len(),
                            "corrector pass complete"
                        );
                    }
                    _ = corrector_shutdown.changed() => {
                        tracing::info!("corrector loop stopping");
                        break;
                    }
                }
            }
        });

        let mut consistency_shutdown = rx;
        spawner.spawn(async move {
            let mut ticker = interval_at(
                Instant::now() + consistency_interval,
                consistency_interval,
            );
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = engine.run_consistency_check();
                        if !report.discrepancies.is_empty() {
                            tracing::warn!(
                                corrected = report.discrepancies.len(),
                                "consistency pass corrected drift"
                            );
                        }
                    }
                    _ = consistency_shutdown.changed() => {
                        tracing::info!("consistency loop stopping");
                        break;
                    }
                }
            }
        });

        SchedulerHandle { shutdown: tx }
    }
}
