//! Collaborator ports consumed by the reconciliation runner.

use async_trait::async_trait;

use medsync_connector::{ConnectorResult, MedicationRecord, PatientId};

use crate::events::SyncEvent;
use crate::resolve::ResolutionOutcome;

/// Receipt returned by the record store after applying a resolved set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReceipt {
    /// Number of records the store created or updated.
    pub updated_count: u32,
}

/// Persistence collaborator for reconciled records.
///
/// `current_records` doubles as the implicit internal source: the
/// collector reads it last on every pass, with the same failure
/// isolation as any external source.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the locally stored medication records for a patient.
    async fn current_records(
        &self,
        patient_id: PatientId,
    ) -> ConnectorResult<Vec<MedicationRecord>>;

    /// Apply a resolved record set for a patient.
    ///
    /// Called at most once per pass, after resolution has produced the
    /// full outcome set; a failure here fails the pass as a whole.
    async fn apply_resolved(
        &self,
        patient_id: PatientId,
        outcomes: &[ResolutionOutcome],
    ) -> ConnectorResult<ApplyReceipt>;
}

/// Delivery channel for sync lifecycle notifications.
///
/// Fire-and-forget: the runner spawns deliveries off the pass path and
/// logs failures. A broken notifier never fails or delays a pass.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one sync event for a patient.
    async fn notify(&self, patient_id: PatientId, event: &SyncEvent) -> ConnectorResult<()>;
}
