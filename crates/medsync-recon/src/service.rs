//! Service facade wiring the store, runner, and scheduler.

use std::sync::Arc;

use tracing::{info, instrument};

use medsync_connector::{PatientId, SourceAdapter};

use crate::collector::SourceCollector;
use crate::config::{CollectorConfig, PatientSyncConfig};
use crate::error::{ReconError, ReconResult};
use crate::events::{EventPublisher, SyncEvent};
use crate::report::SyncReport;
use crate::runner::ReconciliationRunner;
use crate::scheduler::SyncScheduler;
use crate::store::{JobSnapshot, SyncJobStore};
use crate::traits::{Notifier, RecordStore};
use crate::types::JobStatus;

/// Capacity of the sync event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The observable API surface of the reconciliation engine.
///
/// Owns the job store, the pass runner, and the per-patient scheduler.
/// Outer layers call `initialize` / `run_once` / `stop` / `status` and
/// subscribe to lifecycle events; everything else is internal.
pub struct MedSyncService {
    jobs: Arc<SyncJobStore>,
    runner: Arc<ReconciliationRunner>,
    scheduler: SyncScheduler,
    events: EventPublisher,
}

impl MedSyncService {
    /// Create a service with default collector tuning.
    #[must_use]
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        records: Arc<dyn RecordStore>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        Self::with_config(adapters, records, notifier, CollectorConfig::default())
    }

    /// Create a service with custom collector tuning.
    #[must_use]
    pub fn with_config(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        records: Arc<dyn RecordStore>,
        notifier: Option<Arc<dyn Notifier>>,
        collector_config: CollectorConfig,
    ) -> Self {
        let jobs = Arc::new(SyncJobStore::new());
        let (events, _) = EventPublisher::new(EVENT_CHANNEL_CAPACITY);
        let collector = SourceCollector::with_config(adapters, records.clone(), collector_config);
        let runner = Arc::new(ReconciliationRunner::new(
            collector,
            records,
            notifier,
            jobs.clone(),
            events.clone(),
        ));
        let scheduler = SyncScheduler::new(runner.clone());

        Self {
            jobs,
            runner,
            scheduler,
            events,
        }
    }

    /// Subscribe to sync lifecycle events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Create a sync job for a patient and, when the configuration asks
    /// for it, start its schedule.
    ///
    /// Fails fast on invalid configuration and on a patient that
    /// already has an active job.
    #[instrument(skip(self, config), fields(patient_id = %patient_id))]
    pub fn initialize(&self, patient_id: PatientId, config: PatientSyncConfig) -> ReconResult<()> {
        config.validate()?;
        self.jobs.insert(patient_id, &config)?;

        info!(
            sources = config.sources.len(),
            policy = %config.policy,
            frequency = %config.frequency,
            auto_reconcile = config.auto_reconcile,
            "Initialized sync job"
        );
        self.events
            .publish(SyncEvent::SyncInitialized { patient_id });

        if config.auto_reconcile {
            self.scheduler.start(patient_id, config.frequency.interval());
        }
        Ok(())
    }

    /// Trigger one pass outside the schedule.
    ///
    /// Shares the per-patient pass gate with scheduled ticks: a pass
    /// already in flight rejects this call with `PassInProgress`.
    pub async fn run_once(&self, patient_id: PatientId) -> ReconResult<SyncReport> {
        self.runner.run_pass(patient_id).await
    }

    /// Stop a patient's sync job and cancel its future ticks.
    ///
    /// An in-flight pass completes and records its result. Fails with
    /// `NotConfigured` for an unknown patient.
    #[instrument(skip(self), fields(patient_id = %patient_id))]
    pub fn stop(&self, patient_id: PatientId) -> ReconResult<()> {
        self.jobs.set_status(patient_id, JobStatus::Stopped)?;
        match self.scheduler.stop(patient_id) {
            // A job configured with auto_reconcile = false never had a
            // timer; stopping it is still valid.
            Ok(()) | Err(ReconError::NotConfigured { .. }) => {}
            Err(e) => return Err(e),
        }
        info!("Stopped sync job");
        Ok(())
    }

    /// Get a point-in-time copy of a patient's job and history.
    pub fn status(&self, patient_id: PatientId) -> ReconResult<JobSnapshot> {
        self.jobs.snapshot(patient_id)
    }

    /// Check whether a patient currently has an active timer.
    #[must_use]
    pub fn is_scheduled(&self, patient_id: PatientId) -> bool {
        self.scheduler.is_scheduled(patient_id)
    }

    /// Cancel every schedule. Used at teardown; in-flight passes finish.
    pub fn shutdown(&self) {
        self.scheduler.shutdown_all();
    }
}
