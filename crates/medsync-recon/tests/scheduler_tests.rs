//! Scheduler integration tests.
//!
//! Drives the per-patient timer loop with short intervals and scripted
//! adapters, covering tick execution, skip-on-busy, idempotent start,
//! stop semantics, and failure isolation between patients.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use medsync_connector::{
    ConnectorError, ConnectorResult, MedicationRecord, PatientId, SourceAdapter, SourceBinding,
    SourceType,
};
use medsync_recon::{
    ApplyReceipt, EventPublisher, PatientSyncConfig, ReconError, ReconciliationRunner,
    RecordStore, ResolutionOutcome, SourceCollector, SyncJobStore, SyncScheduler,
};

// =============================================================================
// Mocks
// =============================================================================

/// Adapter that counts calls and tracks fetch concurrency.
struct CountingAdapter {
    system: String,
    delay: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl CountingAdapter {
    fn new(system: &str, delay: Duration) -> Self {
        Self {
            system: system.to_string(),
            delay,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for CountingAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::Ehr
    }

    fn system_name(&self) -> &str {
        &self.system
    }

    async fn fetch_records(
        &self,
        _patient_id: PatientId,
    ) -> ConnectorResult<Vec<MedicationRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![MedicationRecord::new(
            SourceType::Ehr,
            self.system.clone(),
            "Lisinopril",
            Utc::now(),
        )
        .with_ndc("123")
        .with_dosage("10mg")])
    }
}

/// Record store that can be told to fail persistence for one patient.
#[derive(Default)]
struct SelectiveStore {
    fail_for: Mutex<Option<PatientId>>,
}

#[async_trait]
impl RecordStore for SelectiveStore {
    async fn current_records(
        &self,
        _patient_id: PatientId,
    ) -> ConnectorResult<Vec<MedicationRecord>> {
        Ok(vec![])
    }

    async fn apply_resolved(
        &self,
        patient_id: PatientId,
        outcomes: &[ResolutionOutcome],
    ) -> ConnectorResult<ApplyReceipt> {
        if *self.fail_for.lock().unwrap() == Some(patient_id) {
            return Err(ConnectorError::unavailable("record store down"));
        }
        Ok(ApplyReceipt {
            updated_count: outcomes.len() as u32,
        })
    }
}

struct Harness {
    jobs: Arc<SyncJobStore>,
    scheduler: SyncScheduler,
    adapter: Arc<CountingAdapter>,
    store: Arc<SelectiveStore>,
}

fn harness(delay: Duration) -> Harness {
    let adapter = Arc::new(CountingAdapter::new("epic-test", delay));
    let store = Arc::new(SelectiveStore::default());
    let jobs = Arc::new(SyncJobStore::new());
    let (events, _) = EventPublisher::new(64);

    let collector = SourceCollector::new(
        vec![adapter.clone() as Arc<dyn SourceAdapter>],
        store.clone() as Arc<dyn RecordStore>,
    );
    let runner = Arc::new(ReconciliationRunner::new(
        collector,
        store.clone(),
        None,
        jobs.clone(),
        events,
    ));
    let scheduler = SyncScheduler::new(runner);

    Harness {
        jobs,
        scheduler,
        adapter,
        store,
    }
}

fn job_config() -> PatientSyncConfig {
    PatientSyncConfig::new(vec![SourceBinding::new(SourceType::Ehr, "epic-test")])
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_scheduled_ticks_trigger_passes() {
    let h = harness(Duration::ZERO);
    let patient = PatientId::new();
    h.jobs.insert(patient, &job_config()).unwrap();

    h.scheduler.start(patient, Duration::from_millis(25));
    tokio::time::sleep(Duration::from_millis(220)).await;
    h.scheduler.stop(patient).unwrap();

    assert!(h.adapter.calls() >= 2, "expected at least two scheduled passes");

    let snapshot = h.jobs.snapshot(patient).unwrap();
    assert!(snapshot.history.successful_runs >= 2);
}

#[tokio::test]
async fn test_busy_tick_is_skipped_not_queued() {
    let h = harness(Duration::from_millis(100));
    let patient = PatientId::new();
    h.jobs.insert(patient, &job_config()).unwrap();

    h.scheduler.start(patient, Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(400)).await;
    h.scheduler.stop(patient).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(h.adapter.calls() >= 2);
    // Passes for one patient never overlap.
    assert_eq!(h.adapter.max_active.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_stop_cancels_future_ticks() {
    let h = harness(Duration::ZERO);
    let patient = PatientId::new();
    h.jobs.insert(patient, &job_config()).unwrap();

    h.scheduler.start(patient, Duration::from_millis(25));
    tokio::time::sleep(Duration::from_millis(120)).await;
    h.scheduler.stop(patient).unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let calls_after_stop = h.adapter.calls();
    assert!(calls_after_stop >= 1);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(h.adapter.calls(), calls_after_stop);
    assert!(!h.scheduler.is_scheduled(patient));
}

#[tokio::test]
async fn test_inflight_pass_completes_after_stop() {
    let h = harness(Duration::from_millis(150));
    let patient = PatientId::new();
    h.jobs.insert(patient, &job_config()).unwrap();

    h.scheduler.start(patient, Duration::from_millis(30));
    // First tick fires at ~30ms; stop while that pass is collecting.
    tokio::time::sleep(Duration::from_millis(60)).await;
    h.scheduler.stop(patient).unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(h.adapter.calls(), 1);
    // The in-flight pass finished and recorded its result.
    let snapshot = h.jobs.snapshot(patient).unwrap();
    assert_eq!(snapshot.history.total_runs, 1);
    assert!(snapshot.job.run_state.is_idle());
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let h = harness(Duration::ZERO);
    let patient = PatientId::new();
    h.jobs.insert(patient, &job_config()).unwrap();

    h.scheduler.start(patient, Duration::from_millis(50));
    h.scheduler.start(patient, Duration::from_millis(50));
    assert!(h.scheduler.is_scheduled(patient));

    h.scheduler.stop(patient).unwrap();
    let err = h.scheduler.stop(patient).unwrap_err();
    assert!(matches!(err, ReconError::NotConfigured { .. }));
}

#[tokio::test]
async fn test_stop_unscheduled_patient_is_not_configured() {
    let h = harness(Duration::ZERO);
    let err = h.scheduler.stop(PatientId::new()).unwrap_err();
    assert!(matches!(err, ReconError::NotConfigured { .. }));
}

#[tokio::test]
async fn test_one_patient_failure_keeps_others_running() {
    let h = harness(Duration::ZERO);
    let failing = PatientId::new();
    let healthy = PatientId::new();
    h.jobs.insert(failing, &job_config()).unwrap();
    h.jobs.insert(healthy, &job_config()).unwrap();
    *h.store.fail_for.lock().unwrap() = Some(failing);

    h.scheduler.start(failing, Duration::from_millis(25));
    h.scheduler.start(healthy, Duration::from_millis(25));
    tokio::time::sleep(Duration::from_millis(220)).await;

    let failing_snapshot = h.jobs.snapshot(failing).unwrap();
    assert!(failing_snapshot.history.total_runs >= 1);
    assert_eq!(failing_snapshot.history.successful_runs, 0);
    assert!(!failing_snapshot.job.last_errors.is_empty());

    // The failing patient never took the healthy patient's timer down.
    let healthy_snapshot = h.jobs.snapshot(healthy).unwrap();
    assert!(healthy_snapshot.history.successful_runs >= 1);
    assert!(h.scheduler.is_scheduled(failing));
    assert!(h.scheduler.is_scheduled(healthy));

    h.scheduler.shutdown_all();
}
