//! Pass reports and rolling per-patient history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use medsync_connector::{PatientId, RunId};

/// Number of recent reports retained per patient.
const MAX_RECENT_REPORTS: usize = 50;

/// Summary of one completed reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Identifier of the pass.
    pub run_id: RunId,
    /// Patient the pass ran for.
    pub patient_id: PatientId,
    /// Number of sources that returned a batch.
    pub source_count: u32,
    /// Total records seen across all batches.
    pub total_records: u32,
    /// Number of field-level conflicts detected.
    pub conflict_count: u32,
    /// Number of outcomes deferred to manual review.
    pub manual_review_count: u32,
    /// Number of records the store created or updated.
    pub updated_count: u32,
    /// Number of per-source failures.
    pub error_count: u32,
    /// Per-source failure descriptions.
    pub errors: Vec<String>,
    /// Wall-clock duration of the pass in milliseconds.
    pub duration_ms: u64,
    /// When the pass completed.
    pub completed_at: DateTime<Utc>,
}

/// Rolling aggregate of a patient's past passes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncHistory {
    /// Total passes attempted, including failures.
    pub total_runs: u32,
    /// Passes that completed and persisted.
    pub successful_runs: u32,
    /// Conflicts detected and resolved across all successful passes.
    pub conflicts_resolved: u32,
    /// When the most recent pass finished, successful or not.
    pub last_run: Option<DateTime<Utc>>,
    /// Most recent reports, newest first.
    pub recent: VecDeque<SyncReport>,
}

impl SyncHistory {
    /// Create an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed pass.
    pub fn record_success(&mut self, report: &SyncReport) {
        self.total_runs += 1;
        self.successful_runs += 1;
        self.conflicts_resolved += report.conflict_count;
        self.last_run = Some(report.completed_at);

        self.recent.push_front(report.clone());
        self.recent.truncate(MAX_RECENT_REPORTS);
    }

    /// Record a failed pass.
    pub fn record_failure(&mut self, failed_at: DateTime<Utc>) {
        self.total_runs += 1;
        self.last_run = Some(failed_at);
    }

    /// Fraction of passes that completed, in `[0, 1]`.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_runs == 0 {
            0.0
        } else {
            f64::from(self.successful_runs) / f64::from(self.total_runs)
        }
    }
}
