//! Reconciliation error types.

use thiserror::Error;

use medsync_connector::PatientId;

use crate::types::RunState;

/// Errors surfaced by the reconciliation engine.
///
/// Individual source failures are deliberately absent here: they are
/// recovered during collection and recorded on the pass report instead
/// of aborting anything. Nothing in this taxonomy is process-fatal; one
/// patient's failure never stops another patient's schedule.
#[derive(Debug, Error)]
pub enum ReconError {
    /// The requested operation carried an invalid configuration.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// No sync job exists for the patient.
    #[error("no sync configured for patient {patient_id}")]
    NotConfigured { patient_id: PatientId },

    /// A pass is already in flight for the patient.
    #[error("reconciliation pass already in flight for patient {patient_id}")]
    PassInProgress { patient_id: PatientId },

    /// A pass stage failed; the pass as a whole is marked failed.
    #[error("pass failed while {stage}: {message}")]
    Pass { stage: RunState, message: String },
}

impl ReconError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a not-configured error.
    pub fn not_configured(patient_id: PatientId) -> Self {
        Self::NotConfigured { patient_id }
    }

    /// Create a pass-in-progress error.
    pub fn pass_in_progress(patient_id: PatientId) -> Self {
        Self::PassInProgress { patient_id }
    }

    /// Create a pass failure error.
    pub fn pass(stage: RunState, message: impl Into<String>) -> Self {
        Self::Pass {
            stage,
            message: message.into(),
        }
    }

    /// Check whether this error means a pass was already running.
    #[must_use]
    pub fn is_pass_in_progress(&self) -> bool {
        matches!(self, ReconError::PassInProgress { .. })
    }
}

/// Result type for reconciliation operations.
pub type ReconResult<T> = Result<T, ReconError>;
