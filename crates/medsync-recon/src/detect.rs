//! Conflict detection across collected sources.

use std::collections::HashMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;

use medsync_connector::MedicationRecord;

use crate::collector::CollectedSources;
use crate::key::{derive_key, CanonicalKey};
use crate::types::{ConflictKind, ConflictSeverity, ResolutionHint};

/// Start dates closer together than this are treated as agreeing.
const DATE_CONFLICT_THRESHOLD_HOURS: i64 = 24;

/// One disagreeing value and the system that reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictValue {
    /// The reported field value.
    pub value: String,
    /// The system that reported it.
    pub source: String,
}

/// A field-level disagreement between two records in a conflict group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConflict {
    /// Kind of disagreement.
    pub kind: ConflictKind,
    /// Name of the disagreeing field.
    pub field: String,
    /// Severity derived from the kind.
    pub severity: ConflictSeverity,
    /// The disagreeing (value, source) pairs.
    pub values: Vec<ConflictValue>,
}

/// Result of analyzing one canonical-key group.
///
/// Every group appears in the detector output, including singletons and
/// multi-record groups whose tracked fields all agree; only genuinely
/// disagreeing data carries conflicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupAnalysis {
    /// Canonical key shared by the group's records.
    pub key: CanonicalKey,
    /// Member records in collection order. Never empty.
    pub records: Vec<MedicationRecord>,
    /// Detected field-level disagreements, possibly empty.
    pub conflicts: Vec<FieldConflict>,
    /// Recommended follow-up derived from conflict severities.
    pub recommendation: ResolutionHint,
}

impl GroupAnalysis {
    /// Check whether this group carries any conflict.
    #[must_use]
    pub fn is_conflicted(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Groups collected records by canonical key and compares tracked
/// fields pairwise against the group's reference record.
pub struct ConflictDetector;

impl ConflictDetector {
    /// Analyze the collected sources.
    ///
    /// Groups preserve first-seen key order, and the first record
    /// encountered in each group is the comparison reference. Tracked
    /// fields are dosage, frequency, status, and start date; a field
    /// only conflicts when both records report it and the values
    /// disagree (start dates by more than one day).
    #[must_use]
    pub fn analyze(collected: &CollectedSources) -> Vec<GroupAnalysis> {
        let mut order: Vec<CanonicalKey> = Vec::new();
        let mut groups: HashMap<CanonicalKey, Vec<MedicationRecord>> = HashMap::new();

        for record in collected.all_records() {
            let key = derive_key(record);
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            groups.entry(key).or_default().push(record.clone());
        }

        let mut analyses = Vec::with_capacity(order.len());
        for key in order {
            let records = groups.remove(&key).unwrap_or_default();
            let conflicts = Self::compare_group(&records);
            let recommendation = if conflicts
                .iter()
                .any(|c| c.severity == ConflictSeverity::High)
            {
                ResolutionHint::ClinicalReview
            } else {
                ResolutionHint::TrustAuthoritative
            };

            if !conflicts.is_empty() {
                debug!(
                    key = %key,
                    conflicts = conflicts.len(),
                    records = records.len(),
                    "Detected conflicted group"
                );
            }

            analyses.push(GroupAnalysis {
                key,
                records,
                conflicts,
                recommendation,
            });
        }

        analyses
    }

    /// Compare every subsequent record in a group against the reference.
    fn compare_group(records: &[MedicationRecord]) -> Vec<FieldConflict> {
        let Some((reference, rest)) = records.split_first() else {
            return Vec::new();
        };

        let mut conflicts = Vec::new();
        for other in rest {
            Self::compare_text_field(
                ConflictKind::DosageMismatch,
                reference.dosage.as_deref(),
                other.dosage.as_deref(),
                reference,
                other,
                &mut conflicts,
            );
            Self::compare_text_field(
                ConflictKind::FrequencyMismatch,
                reference.frequency.as_deref(),
                other.frequency.as_deref(),
                reference,
                other,
                &mut conflicts,
            );
            Self::compare_text_field(
                ConflictKind::StatusMismatch,
                reference.status.as_deref(),
                other.status.as_deref(),
                reference,
                other,
                &mut conflicts,
            );
            Self::compare_start_date(reference, other, &mut conflicts);
        }
        conflicts
    }

    fn compare_text_field(
        kind: ConflictKind,
        reference_value: Option<&str>,
        other_value: Option<&str>,
        reference: &MedicationRecord,
        other: &MedicationRecord,
        conflicts: &mut Vec<FieldConflict>,
    ) {
        let (Some(ref_value), Some(other_value)) = (reference_value, other_value) else {
            return;
        };
        if ref_value == other_value {
            return;
        }

        conflicts.push(FieldConflict {
            kind,
            field: kind.field_name().to_string(),
            severity: kind.severity(),
            values: vec![
                ConflictValue {
                    value: ref_value.to_string(),
                    source: reference.source_system.clone(),
                },
                ConflictValue {
                    value: other_value.to_string(),
                    source: other.source_system.clone(),
                },
            ],
        });
    }

    fn compare_start_date(
        reference: &MedicationRecord,
        other: &MedicationRecord,
        conflicts: &mut Vec<FieldConflict>,
    ) {
        let (Some(ref_date), Some(other_date)) = (reference.start_date, other.start_date) else {
            return;
        };
        let delta = (ref_date - other_date).abs();
        if delta <= Duration::hours(DATE_CONFLICT_THRESHOLD_HOURS) {
            return;
        }

        let kind = ConflictKind::DateMismatch;
        conflicts.push(FieldConflict {
            kind,
            field: kind.field_name().to_string(),
            severity: kind.severity(),
            values: vec![
                ConflictValue {
                    value: ref_date.to_rfc3339(),
                    source: reference.source_system.clone(),
                },
                ConflictValue {
                    value: other_date.to_rfc3339(),
                    source: other.source_system.clone(),
                },
            ],
        });
    }
}
