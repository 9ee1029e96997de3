//! One-pass reconciliation orchestration.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use medsync_connector::{PatientId, RunId};

use crate::collector::SourceCollector;
use crate::detect::ConflictDetector;
use crate::error::{ReconError, ReconResult};
use crate::events::{EventPublisher, SyncEvent};
use crate::report::SyncReport;
use crate::resolve::ConflictResolver;
use crate::store::{SyncJob, SyncJobStore};
use crate::traits::{Notifier, RecordStore};
use crate::types::{ConflictSeverity, RunState};

/// Runs one full reconciliation pass for one patient:
/// collect → detect → resolve → persist → report.
///
/// The pass gate lives in the job store: `run_pass` claims it
/// atomically before collecting, so a second pass for the same patient
/// is rejected rather than interleaved, whether it was triggered by the
/// scheduler or manually. From the caller's perspective a pass either
/// completes and persists as a whole or is marked failed; resolved
/// records are never partially committed.
pub struct ReconciliationRunner {
    collector: SourceCollector,
    records: Arc<dyn RecordStore>,
    notifier: Option<Arc<dyn Notifier>>,
    jobs: Arc<SyncJobStore>,
    events: EventPublisher,
}

impl ReconciliationRunner {
    /// Create a runner.
    #[must_use]
    pub fn new(
        collector: SourceCollector,
        records: Arc<dyn RecordStore>,
        notifier: Option<Arc<dyn Notifier>>,
        jobs: Arc<SyncJobStore>,
        events: EventPublisher,
    ) -> Self {
        Self {
            collector,
            records,
            notifier,
            jobs,
            events,
        }
    }

    /// Run one pass for a patient.
    ///
    /// Fails with `NotConfigured` for an unknown patient and
    /// `PassInProgress` when a pass already holds the gate.
    #[instrument(skip(self), fields(patient_id = %patient_id))]
    pub async fn run_pass(&self, patient_id: PatientId) -> ReconResult<SyncReport> {
        let job = self.jobs.begin_pass(patient_id)?;
        let run_id = RunId::new();
        let started = Instant::now();

        info!(run_id = %run_id, policy = %job.policy, "Starting reconciliation pass");
        self.dispatch(SyncEvent::SyncStarted { patient_id, run_id });

        match self.execute(patient_id, run_id, &job, started).await {
            Ok(report) => {
                self.jobs.complete_pass(patient_id, &report)?;
                info!(
                    run_id = %run_id,
                    conflicts = report.conflict_count,
                    updated = report.updated_count,
                    errors = report.error_count,
                    duration_ms = report.duration_ms,
                    "Reconciliation pass completed"
                );
                self.dispatch(SyncEvent::SyncCompleted {
                    patient_id,
                    report: report.clone(),
                });
                Ok(report)
            }
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Reconciliation pass failed");
                if let Err(store_err) = self.jobs.fail_pass(patient_id, &e.to_string(), Utc::now())
                {
                    error!(error = %store_err, "Failed to record pass failure");
                }
                self.dispatch(SyncEvent::SyncFailed {
                    patient_id,
                    run_id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        patient_id: PatientId,
        run_id: RunId,
        job: &SyncJob,
        started: Instant,
    ) -> ReconResult<SyncReport> {
        // State is already Collecting; the gate claim set it.
        let collected = self.collector.collect(patient_id, &job.sources).await;

        self.jobs.set_state(patient_id, RunState::Detecting)?;
        let groups = ConflictDetector::analyze(&collected);
        let conflict_count: u32 = groups.iter().map(|g| g.conflicts.len() as u32).sum();
        if conflict_count > 0 {
            let high_severity = groups
                .iter()
                .flat_map(|g| g.conflicts.iter())
                .any(|c| c.severity == ConflictSeverity::High);
            self.dispatch(SyncEvent::ConflictDetected {
                patient_id,
                run_id,
                conflict_count,
                high_severity,
            });
        }

        self.jobs.set_state(patient_id, RunState::Resolving)?;
        let outcomes = ConflictResolver::resolve(&groups, job.policy);
        let manual_review_count = outcomes
            .iter()
            .filter(|o| o.requires_manual_review)
            .count() as u32;

        self.jobs.set_state(patient_id, RunState::Persisting)?;
        let receipt = self
            .records
            .apply_resolved(patient_id, &outcomes)
            .await
            .map_err(|e| ReconError::pass(RunState::Persisting, e.to_string()))?;

        self.jobs.set_state(patient_id, RunState::Reporting)?;
        Ok(SyncReport {
            run_id,
            patient_id,
            source_count: collected.sources.len() as u32,
            total_records: collected.total_records() as u32,
            conflict_count,
            manual_review_count,
            updated_count: receipt.updated_count,
            error_count: collected.errors.len() as u32,
            errors: collected
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.source, e.error))
                .collect(),
            duration_ms: started.elapsed().as_millis() as u64,
            completed_at: Utc::now(),
        })
    }

    /// Publish an event and hand it to the notifier off the pass path.
    fn dispatch(&self, event: SyncEvent) {
        self.events.publish(event.clone());

        if let Some(notifier) = &self.notifier {
            let notifier = notifier.clone();
            let patient_id = event.patient_id();
            tokio::spawn(async move {
                if let Err(e) = notifier.notify(patient_id, &event).await {
                    warn!(
                        patient_id = %patient_id,
                        event = event.event_type(),
                        error = %e,
                        "Notification delivery failed"
                    );
                }
            });
        }
    }
}
