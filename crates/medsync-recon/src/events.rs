//! Typed sync lifecycle events over a broadcast channel.
//!
//! Callers subscribe for completion/failure/conflict notifications
//! instead of registering listeners; ordering is whatever the channel
//! delivers and every subscriber sees every event.

use serde::{Deserialize, Serialize};

use medsync_connector::{PatientId, RunId};

use crate::report::SyncReport;

/// A sync lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A sync job was created for a patient.
    SyncInitialized {
        /// Patient the job was created for.
        patient_id: PatientId,
    },
    /// A reconciliation pass started.
    SyncStarted {
        /// Patient the pass runs for.
        patient_id: PatientId,
        /// Identifier of the pass.
        run_id: RunId,
    },
    /// A reconciliation pass completed and persisted.
    SyncCompleted {
        /// Patient the pass ran for.
        patient_id: PatientId,
        /// The pass report.
        report: SyncReport,
    },
    /// A reconciliation pass failed.
    SyncFailed {
        /// Patient the pass ran for.
        patient_id: PatientId,
        /// Identifier of the pass.
        run_id: RunId,
        /// Failure description.
        error: String,
    },
    /// Conflicts were detected during a pass.
    ConflictDetected {
        /// Patient the pass ran for.
        patient_id: PatientId,
        /// Identifier of the pass.
        run_id: RunId,
        /// Number of field-level conflicts.
        conflict_count: u32,
        /// Whether any conflict was high severity.
        high_severity: bool,
    },
}

impl SyncEvent {
    /// The wire name of this event.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            SyncEvent::SyncInitialized { .. } => "sync_initialized",
            SyncEvent::SyncStarted { .. } => "sync_started",
            SyncEvent::SyncCompleted { .. } => "sync_completed",
            SyncEvent::SyncFailed { .. } => "sync_failed",
            SyncEvent::ConflictDetected { .. } => "conflict_detected",
        }
    }

    /// The patient this event concerns.
    #[must_use]
    pub fn patient_id(&self) -> PatientId {
        match self {
            SyncEvent::SyncInitialized { patient_id }
            | SyncEvent::SyncStarted { patient_id, .. }
            | SyncEvent::SyncCompleted { patient_id, .. }
            | SyncEvent::SyncFailed { patient_id, .. }
            | SyncEvent::ConflictDetected { patient_id, .. } => *patient_id,
        }
    }
}

/// Publisher that sends sync events to a broadcast channel.
#[derive(Clone)]
pub struct EventPublisher {
    sender: tokio::sync::broadcast::Sender<SyncEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the given channel capacity.
    pub fn new(capacity: usize) -> (Self, tokio::sync::broadcast::Receiver<SyncEvent>) {
        let (sender, receiver) = tokio::sync::broadcast::channel(capacity);
        (Self { sender }, receiver)
    }

    /// Publish an event to all subscribers. Failures are logged, never
    /// propagated.
    pub fn publish(&self, event: SyncEvent) {
        if let Err(e) = self.sender.send(event) {
            tracing::debug!(error = %e, "No active subscribers to receive sync event");
        }
    }

    /// Get a new receiver for the broadcast channel.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }
}
