//! In-memory per-patient job store.
//!
//! All mutation funnels through the runner; readers get cloned
//! snapshots, never the live object. The outer map lock is held only to
//! reach a patient's slot, and the per-slot locks are never held across
//! an await, so passes for different patients proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use medsync_connector::{PatientId, SourceBinding};

use crate::config::PatientSyncConfig;
use crate::error::{ReconError, ReconResult};
use crate::report::{SyncHistory, SyncReport};
use crate::types::{FrequencyTier, JobStatus, ResolutionPolicy, RunState};

/// Per-patient configuration and runtime state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    /// Patient this job reconciles for.
    pub patient_id: PatientId,
    /// Configured external sources, in collection order.
    pub sources: Vec<SourceBinding>,
    /// Scheduling cadence tier.
    pub frequency: FrequencyTier,
    /// Resolution policy for conflicted groups.
    pub policy: ResolutionPolicy,
    /// Whether automatic passes are scheduled.
    pub auto_reconcile: bool,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Stage of the in-flight pass, `Idle` between passes.
    pub run_state: RunState,
    /// When the most recent pass finished.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Errors from the most recent pass.
    pub last_errors: Vec<String>,
    /// Conflicts detected by the most recent successful pass.
    pub last_conflicts: u32,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job last changed.
    pub updated_at: DateTime<Utc>,
}

impl SyncJob {
    /// Create a job from an initialize-time configuration.
    #[must_use]
    pub fn from_config(patient_id: PatientId, config: &PatientSyncConfig) -> Self {
        let now = Utc::now();
        Self {
            patient_id,
            sources: config.sources.clone(),
            frequency: config.frequency,
            policy: config.policy,
            auto_reconcile: config.auto_reconcile,
            status: JobStatus::Active,
            run_state: RunState::Idle,
            last_run_at: None,
            last_errors: Vec::new(),
            last_conflicts: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Point-in-time copy of a job and its history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// The job state at snapshot time.
    pub job: SyncJob,
    /// The run history at snapshot time.
    pub history: SyncHistory,
}

struct JobSlot {
    job: Mutex<SyncJob>,
    history: Mutex<SyncHistory>,
}

/// In-memory mapping from patient to sync job and history.
#[derive(Default)]
pub struct SyncJobStore {
    slots: RwLock<HashMap<PatientId, Arc<JobSlot>>>,
}

impl SyncJobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a job for a patient.
    ///
    /// Fails if the patient already has an active job; stop the
    /// existing job before reconfiguring. Replacing a stopped job
    /// starts with a fresh history.
    pub fn insert(&self, patient_id: PatientId, config: &PatientSyncConfig) -> ReconResult<()> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get(&patient_id) {
            let status = slot
                .job
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .status;
            if status == JobStatus::Active {
                return Err(ReconError::configuration(format!(
                    "sync already configured for patient {patient_id}"
                )));
            }
        }
        slots.insert(
            patient_id,
            Arc::new(JobSlot {
                job: Mutex::new(SyncJob::from_config(patient_id, config)),
                history: Mutex::new(SyncHistory::new()),
            }),
        );
        Ok(())
    }

    /// Check whether a patient has a job.
    #[must_use]
    pub fn contains(&self, patient_id: PatientId) -> bool {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&patient_id)
    }

    /// All patients with a job.
    #[must_use]
    pub fn patient_ids(&self) -> Vec<PatientId> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// Atomically claim the pass gate for a patient.
    ///
    /// Transitions `Idle → Collecting` and returns a snapshot of the job
    /// carrying the configuration the pass should run with. Returns
    /// `PassInProgress` when another pass holds the gate; manual and
    /// scheduled passes share this exclusion.
    pub fn begin_pass(&self, patient_id: PatientId) -> ReconResult<SyncJob> {
        let slot = self.slot(patient_id)?;
        let mut job = slot.job.lock().unwrap_or_else(PoisonError::into_inner);
        if !job.run_state.is_idle() {
            return Err(ReconError::pass_in_progress(patient_id));
        }
        job.run_state = RunState::Collecting;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    /// Advance the in-flight pass to a new stage.
    pub fn set_state(&self, patient_id: PatientId, state: RunState) -> ReconResult<()> {
        let slot = self.slot(patient_id)?;
        let mut job = slot.job.lock().unwrap_or_else(PoisonError::into_inner);
        job.run_state = state;
        job.updated_at = Utc::now();
        Ok(())
    }

    /// Record a completed pass and release the gate.
    pub fn complete_pass(&self, patient_id: PatientId, report: &SyncReport) -> ReconResult<()> {
        let slot = self.slot(patient_id)?;
        {
            let mut job = slot.job.lock().unwrap_or_else(PoisonError::into_inner);
            job.run_state = RunState::Idle;
            job.last_run_at = Some(report.completed_at);
            job.last_errors = report.errors.clone();
            job.last_conflicts = report.conflict_count;
            job.updated_at = Utc::now();
        }
        let mut history = slot.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.record_success(report);
        Ok(())
    }

    /// Record a failed pass and release the gate.
    pub fn fail_pass(
        &self,
        patient_id: PatientId,
        error: &str,
        failed_at: DateTime<Utc>,
    ) -> ReconResult<()> {
        let slot = self.slot(patient_id)?;
        {
            let mut job = slot.job.lock().unwrap_or_else(PoisonError::into_inner);
            job.run_state = RunState::Idle;
            job.last_run_at = Some(failed_at);
            job.last_errors = vec![error.to_string()];
            job.updated_at = Utc::now();
        }
        let mut history = slot.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.record_failure(failed_at);
        Ok(())
    }

    /// Set the lifecycle status of a job.
    pub fn set_status(&self, patient_id: PatientId, status: JobStatus) -> ReconResult<()> {
        let slot = self.slot(patient_id)?;
        let mut job = slot.job.lock().unwrap_or_else(PoisonError::into_inner);
        job.status = status;
        job.updated_at = Utc::now();
        Ok(())
    }

    /// Get a point-in-time copy of a job and its history.
    pub fn snapshot(&self, patient_id: PatientId) -> ReconResult<JobSnapshot> {
        let slot = self.slot(patient_id)?;
        let job = slot
            .job
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let history = slot
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(JobSnapshot { job, history })
    }

    fn slot(&self, patient_id: PatientId) -> ReconResult<Arc<JobSlot>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&patient_id)
            .cloned()
            .ok_or(ReconError::NotConfigured { patient_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medsync_connector::SourceType;

    fn config() -> PatientSyncConfig {
        PatientSyncConfig::new(vec![SourceBinding::new(SourceType::Ehr, "epic-test")])
    }

    fn report(patient_id: PatientId) -> SyncReport {
        SyncReport {
            run_id: medsync_connector::RunId::new(),
            patient_id,
            source_count: 2,
            total_records: 4,
            conflict_count: 1,
            manual_review_count: 0,
            updated_count: 2,
            error_count: 0,
            errors: vec![],
            duration_ms: 10,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_and_snapshot() {
        let store = SyncJobStore::new();
        let id = PatientId::new();
        store.insert(id, &config()).unwrap();

        let snapshot = store.snapshot(id).unwrap();
        assert_eq!(snapshot.job.patient_id, id);
        assert_eq!(snapshot.job.status, JobStatus::Active);
        assert_eq!(snapshot.job.run_state, RunState::Idle);
        assert_eq!(snapshot.history.total_runs, 0);
    }

    #[test]
    fn test_double_insert_rejected_while_active() {
        let store = SyncJobStore::new();
        let id = PatientId::new();
        store.insert(id, &config()).unwrap();

        let err = store.insert(id, &config()).unwrap_err();
        assert!(matches!(err, ReconError::Configuration { .. }));
    }

    #[test]
    fn test_stopped_job_can_be_reconfigured() {
        let store = SyncJobStore::new();
        let id = PatientId::new();
        store.insert(id, &config()).unwrap();
        store.set_status(id, JobStatus::Stopped).unwrap();

        store.insert(id, &config()).unwrap();
        let snapshot = store.snapshot(id).unwrap();
        assert_eq!(snapshot.job.status, JobStatus::Active);
        assert_eq!(snapshot.history.total_runs, 0);
    }

    #[test]
    fn test_unknown_patient_not_configured() {
        let store = SyncJobStore::new();
        let err = store.snapshot(PatientId::new()).unwrap_err();
        assert!(matches!(err, ReconError::NotConfigured { .. }));
    }

    #[test]
    fn test_begin_pass_gate_is_exclusive() {
        let store = SyncJobStore::new();
        let id = PatientId::new();
        store.insert(id, &config()).unwrap();

        let job = store.begin_pass(id).unwrap();
        assert_eq!(job.policy, ResolutionPolicy::FirstSeen);

        let err = store.begin_pass(id).unwrap_err();
        assert!(err.is_pass_in_progress());

        // Completing releases the gate.
        store.complete_pass(id, &report(id)).unwrap();
        assert!(store.begin_pass(id).is_ok());
    }

    #[test]
    fn test_complete_pass_updates_job_and_history() {
        let store = SyncJobStore::new();
        let id = PatientId::new();
        store.insert(id, &config()).unwrap();

        store.begin_pass(id).unwrap();
        store.complete_pass(id, &report(id)).unwrap();

        let snapshot = store.snapshot(id).unwrap();
        assert_eq!(snapshot.job.run_state, RunState::Idle);
        assert_eq!(snapshot.job.last_conflicts, 1);
        assert!(snapshot.job.last_run_at.is_some());
        assert_eq!(snapshot.history.successful_runs, 1);
    }

    #[test]
    fn test_fail_pass_captures_error() {
        let store = SyncJobStore::new();
        let id = PatientId::new();
        store.insert(id, &config()).unwrap();

        store.begin_pass(id).unwrap();
        store.fail_pass(id, "store unavailable", Utc::now()).unwrap();

        let snapshot = store.snapshot(id).unwrap();
        assert_eq!(snapshot.job.run_state, RunState::Idle);
        assert_eq!(snapshot.job.last_errors, vec!["store unavailable"]);
        assert_eq!(snapshot.history.total_runs, 1);
        assert_eq!(snapshot.history.successful_runs, 0);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = SyncJobStore::new();
        let id = PatientId::new();
        store.insert(id, &config()).unwrap();

        let mut snapshot = store.snapshot(id).unwrap();
        snapshot.job.status = JobStatus::Stopped;

        assert_eq!(store.snapshot(id).unwrap().job.status, JobStatus::Active);
    }
}
