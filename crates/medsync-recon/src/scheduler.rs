//! Per-patient scheduling of reconciliation passes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use medsync_connector::PatientId;

use crate::error::{ReconError, ReconResult};
use crate::runner::ReconciliationRunner;

/// Cancellation handle for one patient's timer task.
struct ScheduleHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns one timer task per scheduled patient.
///
/// Each task ticks at the patient's cadence and triggers a pass through
/// the runner. A tick that lands while a pass is still in flight is
/// skipped and logged; ticks never queue a backlog. Stopping cancels
/// future ticks but lets an in-flight pass finish and record its
/// result.
pub struct SyncScheduler {
    runner: Arc<ReconciliationRunner>,
    timers: Mutex<HashMap<PatientId, ScheduleHandle>>,
}

impl SyncScheduler {
    /// Create a scheduler.
    #[must_use]
    pub fn new(runner: Arc<ReconciliationRunner>) -> Self {
        Self {
            runner,
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Start a timer for a patient, firing every `every`.
    ///
    /// Idempotent: starting an already-scheduled patient is a no-op.
    /// The first pass fires one interval after start.
    pub fn start(&self, patient_id: PatientId, every: Duration) {
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(handle) = timers.get(&patient_id) {
            if !handle.task.is_finished() {
                debug!(patient_id = %patient_id, "Schedule already active; ignoring start");
                return;
            }
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let runner = self.runner.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The initial tick completes immediately; consume it so the
            // first pass fires a full interval after start.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                        match runner.run_pass(patient_id).await {
                            Ok(report) => {
                                debug!(
                                    patient_id = %patient_id,
                                    run_id = %report.run_id,
                                    "Scheduled pass completed"
                                );
                            }
                            Err(e) if e.is_pass_in_progress() => {
                                info!(
                                    patient_id = %patient_id,
                                    "Pass already in flight; skipping tick"
                                );
                            }
                            Err(e) => {
                                // Not retried early; the next tick is the retry.
                                warn!(patient_id = %patient_id, error = %e, "Scheduled pass failed");
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        break;
                    }
                }
            }

            debug!(patient_id = %patient_id, "Schedule loop stopped");
        });

        timers.insert(patient_id, ScheduleHandle { shutdown, task });
        info!(patient_id = %patient_id, interval_secs = every.as_secs(), "Schedule started");
    }

    /// Cancel a patient's timer.
    ///
    /// An in-flight pass is not interrupted; it completes and records
    /// its result, after which no further ticks fire.
    pub fn stop(&self, patient_id: PatientId) -> ReconResult<()> {
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        match timers.remove(&patient_id) {
            Some(handle) => {
                let _ = handle.shutdown.send(true);
                info!(patient_id = %patient_id, "Schedule stopped");
                Ok(())
            }
            None => Err(ReconError::not_configured(patient_id)),
        }
    }

    /// Check whether a patient currently has an active timer.
    #[must_use]
    pub fn is_scheduled(&self, patient_id: PatientId) -> bool {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&patient_id)
            .is_some_and(|handle| !handle.task.is_finished())
    }

    /// Cancel every timer. Used at service teardown.
    pub fn shutdown_all(&self) {
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        for (patient_id, handle) in timers.drain() {
            let _ = handle.shutdown.send(true);
            debug!(patient_id = %patient_id, "Schedule stopped during shutdown");
        }
    }
}
