//! Conflict resolution policies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use medsync_connector::{MedicationRecord, SourceType};

use crate::detect::{FieldConflict, GroupAnalysis};
use crate::key::CanonicalKey;
use crate::types::{ResolutionMethod, ResolutionPolicy};

/// The result of resolving one canonical-key group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    /// The record selected for this group.
    ///
    /// For a manual-review outcome this is the reference record carried
    /// as a provisional value; it is not authoritative until reviewed.
    pub resolved: MedicationRecord,
    /// How the record was selected.
    pub method: ResolutionMethod,
    /// When resolution happened.
    pub resolved_at: DateTime<Utc>,
    /// The originating conflict group key; `None` when the group had no
    /// conflicts.
    pub group_key: Option<CanonicalKey>,
    /// Whether a human reviewer must confirm this outcome.
    pub requires_manual_review: bool,
    /// Detected conflicts carried for audit and review.
    pub conflicts: Vec<FieldConflict>,
}

/// Applies the configured resolution policy to analyzed groups.
///
/// Every group produces exactly one outcome, so each canonical key
/// appears exactly once in the output and no record is silently
/// dropped. Groups of three or more records still pick a single winner
/// by source type or timestamp; there is no majority vote.
pub struct ConflictResolver;

impl ConflictResolver {
    /// Resolve all groups under one policy.
    #[must_use]
    pub fn resolve(groups: &[GroupAnalysis], policy: ResolutionPolicy) -> Vec<ResolutionOutcome> {
        groups
            .iter()
            .filter_map(|group| Self::resolve_group(group, policy))
            .collect()
    }

    fn resolve_group(group: &GroupAnalysis, policy: ResolutionPolicy) -> Option<ResolutionOutcome> {
        let reference = group.records.first()?;

        if group.is_conflicted() && policy == ResolutionPolicy::Manual {
            debug!(key = %group.key, "Deferring conflicted group to manual review");
            return Some(ResolutionOutcome {
                resolved: reference.clone(),
                method: ResolutionMethod::ManualReview,
                resolved_at: Utc::now(),
                group_key: Some(group.key.clone()),
                requires_manual_review: true,
                conflicts: group.conflicts.clone(),
            });
        }

        let (resolved, method) = Self::pick(&group.records, policy);
        Some(ResolutionOutcome {
            resolved,
            method,
            resolved_at: Utc::now(),
            group_key: group.is_conflicted().then(|| group.key.clone()),
            requires_manual_review: false,
            conflicts: group.conflicts.clone(),
        })
    }

    /// Select a single winner from a non-empty group.
    ///
    /// Priority policies fall back to the first-seen pick when their
    /// preferred source type is absent, and the reported method records
    /// the rule that actually selected the record.
    fn pick(
        records: &[MedicationRecord],
        policy: ResolutionPolicy,
    ) -> (MedicationRecord, ResolutionMethod) {
        match policy {
            ResolutionPolicy::EhrPriority => {
                Self::pick_by_source(records, SourceType::Ehr, ResolutionMethod::EhrPriority)
            }
            ResolutionPolicy::PharmacyPriority => Self::pick_by_source(
                records,
                SourceType::Pharmacy,
                ResolutionMethod::PharmacyPriority,
            ),
            ResolutionPolicy::LatestTimestamp => {
                let mut best = &records[0];
                for record in &records[1..] {
                    // Strictly greater, so the first record among ties wins.
                    if record.collected_at > best.collected_at {
                        best = record;
                    }
                }
                (best.clone(), ResolutionMethod::LatestTimestamp)
            }
            ResolutionPolicy::Manual | ResolutionPolicy::FirstSeen => {
                (records[0].clone(), ResolutionMethod::FirstSeen)
            }
        }
    }

    fn pick_by_source(
        records: &[MedicationRecord],
        preferred: SourceType,
        method: ResolutionMethod,
    ) -> (MedicationRecord, ResolutionMethod) {
        match records.iter().find(|r| r.source_type == preferred) {
            Some(record) => (record.clone(), method),
            None => (records[0].clone(), ResolutionMethod::FirstSeen),
        }
    }
}
