//! Common types for reconciliation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Kind of field-level disagreement detected within a conflict group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Sources disagree on dosage.
    DosageMismatch,
    /// Sources disagree on administration frequency.
    FrequencyMismatch,
    /// Sources disagree on prescription status.
    StatusMismatch,
    /// Sources disagree on the start date by more than one day.
    DateMismatch,
}

impl ConflictKind {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::DosageMismatch => "dosage_mismatch",
            ConflictKind::FrequencyMismatch => "frequency_mismatch",
            ConflictKind::StatusMismatch => "status_mismatch",
            ConflictKind::DateMismatch => "date_mismatch",
        }
    }

    /// The record field this conflict kind compares.
    #[must_use]
    pub fn field_name(&self) -> &'static str {
        match self {
            ConflictKind::DosageMismatch => "dosage",
            ConflictKind::FrequencyMismatch => "frequency",
            ConflictKind::StatusMismatch => "status",
            ConflictKind::DateMismatch => "start_date",
        }
    }

    /// The severity assigned to this conflict kind.
    ///
    /// Dosage and frequency disagreements are clinically significant;
    /// status disagreements usually reflect lifecycle lag between
    /// systems; date disagreements beyond the one-day threshold are
    /// informational.
    #[must_use]
    pub fn severity(&self) -> ConflictSeverity {
        match self {
            ConflictKind::DosageMismatch | ConflictKind::FrequencyMismatch => {
                ConflictSeverity::High
            }
            ConflictKind::StatusMismatch => ConflictSeverity::Medium,
            ConflictKind::DateMismatch => ConflictSeverity::Low,
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConflictKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dosage_mismatch" => Ok(ConflictKind::DosageMismatch),
            "frequency_mismatch" => Ok(ConflictKind::FrequencyMismatch),
            "status_mismatch" => Ok(ConflictKind::StatusMismatch),
            "date_mismatch" => Ok(ConflictKind::DateMismatch),
            _ => Err(format!("Unknown conflict kind: {s}")),
        }
    }
}

/// Severity of a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    /// Clinically significant disagreement.
    High,
    /// Lifecycle disagreement.
    Medium,
    /// Informational disagreement.
    Low,
}

impl ConflictSeverity {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictSeverity::High => "high",
            ConflictSeverity::Medium => "medium",
            ConflictSeverity::Low => "low",
        }
    }
}

impl fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConflictSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(ConflictSeverity::High),
            "medium" => Ok(ConflictSeverity::Medium),
            "low" => Ok(ConflictSeverity::Low),
            _ => Err(format!("Unknown conflict severity: {s}")),
        }
    }
}

/// Resolution policy configured per patient.
///
/// A closed set: unknown policy names are rejected when the
/// configuration is parsed, never silently mapped to a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// Prefer the EHR record when one is present in the group.
    EhrPriority,
    /// Prefer the pharmacy record when one is present in the group.
    PharmacyPriority,
    /// Prefer the most recently collected record.
    LatestTimestamp,
    /// Never auto-resolve; every conflicted group goes to manual review.
    Manual,
    /// Pick the first record encountered. Stable and deterministic but
    /// not authoritative; the fallback of last resort.
    FirstSeen,
}

impl ResolutionPolicy {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionPolicy::EhrPriority => "ehr_priority",
            ResolutionPolicy::PharmacyPriority => "pharmacy_priority",
            ResolutionPolicy::LatestTimestamp => "latest_timestamp",
            ResolutionPolicy::Manual => "manual",
            ResolutionPolicy::FirstSeen => "first_seen",
        }
    }
}

impl fmt::Display for ResolutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ResolutionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ehr_priority" => Ok(ResolutionPolicy::EhrPriority),
            "pharmacy_priority" => Ok(ResolutionPolicy::PharmacyPriority),
            "latest_timestamp" => Ok(ResolutionPolicy::LatestTimestamp),
            "manual" => Ok(ResolutionPolicy::Manual),
            "first_seen" => Ok(ResolutionPolicy::FirstSeen),
            _ => Err(format!("Unknown resolution policy: {s}")),
        }
    }
}

/// How one resolution outcome was produced.
///
/// Matches the policy that actually selected the record: a priority
/// policy that fell back reports `FirstSeen`, and a conflicted group
/// under the manual policy reports `ManualReview`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// The EHR record was selected by priority.
    EhrPriority,
    /// The pharmacy record was selected by priority.
    PharmacyPriority,
    /// The most recently collected record was selected.
    LatestTimestamp,
    /// The first record encountered was selected.
    FirstSeen,
    /// Resolution was deferred to a human reviewer.
    ManualReview,
}

impl ResolutionMethod {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMethod::EhrPriority => "ehr_priority",
            ResolutionMethod::PharmacyPriority => "pharmacy_priority",
            ResolutionMethod::LatestTimestamp => "latest_timestamp",
            ResolutionMethod::FirstSeen => "first_seen",
            ResolutionMethod::ManualReview => "manual_review",
        }
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recommended follow-up for an analyzed conflict group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionHint {
    /// At least one high-severity conflict; escalate to clinical review.
    ClinicalReview,
    /// Trust the most authoritative source present.
    TrustAuthoritative,
}

impl ResolutionHint {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionHint::ClinicalReview => "clinical_review",
            ResolutionHint::TrustAuthoritative => "trust_authoritative",
        }
    }
}

impl fmt::Display for ResolutionHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scheduling cadence tier for a patient's sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyTier {
    /// Every 5 minutes.
    HighFrequency,
    /// Every 15 minutes. This is also the effective retry delay after a
    /// failed pass: failures are not retried early, the next tick is the
    /// retry.
    Standard,
    /// Every 60 minutes.
    LowFrequency,
}

impl FrequencyTier {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyTier::HighFrequency => "high_frequency",
            FrequencyTier::Standard => "standard",
            FrequencyTier::LowFrequency => "low_frequency",
        }
    }

    /// The tick interval for this tier.
    #[must_use]
    pub fn interval(&self) -> Duration {
        match self {
            FrequencyTier::HighFrequency => Duration::from_secs(5 * 60),
            FrequencyTier::Standard => Duration::from_secs(15 * 60),
            FrequencyTier::LowFrequency => Duration::from_secs(60 * 60),
        }
    }
}

impl fmt::Display for FrequencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FrequencyTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high_frequency" => Ok(FrequencyTier::HighFrequency),
            "standard" => Ok(FrequencyTier::Standard),
            "low_frequency" => Ok(FrequencyTier::LowFrequency),
            _ => Err(format!("Unknown frequency tier: {s}")),
        }
    }
}

/// Lifecycle status of a patient's sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Scheduled and eligible for passes.
    Active,
    /// Explicitly stopped; no further scheduled ticks.
    Stopped,
}

impl JobStatus {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stage of the reconciliation pass state machine.
///
/// A pass moves `Idle → Collecting → Detecting → Resolving → Persisting
/// → Reporting → Idle`; any stage failure returns the job to `Idle` with
/// the error captured on the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No pass in flight.
    Idle,
    /// Gathering batches from configured sources.
    Collecting,
    /// Grouping records and comparing tracked fields.
    Detecting,
    /// Applying the resolution policy.
    Resolving,
    /// Handing the resolved set to the record store.
    Persisting,
    /// Building the pass report.
    Reporting,
}

impl RunState {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Collecting => "collecting",
            RunState::Detecting => "detecting",
            RunState::Resolving => "resolving",
            RunState::Persisting => "persisting",
            RunState::Reporting => "reporting",
        }
    }

    /// Check whether no pass is in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, RunState::Idle)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_kind_roundtrip() {
        for kind in [
            ConflictKind::DosageMismatch,
            ConflictKind::FrequencyMismatch,
            ConflictKind::StatusMismatch,
            ConflictKind::DateMismatch,
        ] {
            let s = kind.as_str();
            let parsed: ConflictKind = s.parse().unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn test_conflict_kind_severity() {
        assert_eq!(
            ConflictKind::DosageMismatch.severity(),
            ConflictSeverity::High
        );
        assert_eq!(
            ConflictKind::FrequencyMismatch.severity(),
            ConflictSeverity::High
        );
        assert_eq!(
            ConflictKind::StatusMismatch.severity(),
            ConflictSeverity::Medium
        );
        assert_eq!(ConflictKind::DateMismatch.severity(), ConflictSeverity::Low);
    }

    #[test]
    fn test_conflict_kind_fields() {
        assert_eq!(ConflictKind::DosageMismatch.field_name(), "dosage");
        assert_eq!(ConflictKind::DateMismatch.field_name(), "start_date");
    }

    #[test]
    fn test_resolution_policy_roundtrip() {
        for policy in [
            ResolutionPolicy::EhrPriority,
            ResolutionPolicy::PharmacyPriority,
            ResolutionPolicy::LatestTimestamp,
            ResolutionPolicy::Manual,
            ResolutionPolicy::FirstSeen,
        ] {
            let s = policy.as_str();
            let parsed: ResolutionPolicy = s.parse().unwrap();
            assert_eq!(policy, parsed);
        }
    }

    #[test]
    fn test_resolution_policy_unknown_fails_fast() {
        assert!("majority_vote".parse::<ResolutionPolicy>().is_err());
        assert!(serde_json::from_str::<ResolutionPolicy>("\"majority_vote\"").is_err());
    }

    #[test]
    fn test_frequency_tier_intervals() {
        assert_eq!(
            FrequencyTier::HighFrequency.interval(),
            Duration::from_secs(300)
        );
        assert_eq!(FrequencyTier::Standard.interval(), Duration::from_secs(900));
        assert_eq!(
            FrequencyTier::LowFrequency.interval(),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_run_state_idle() {
        assert!(RunState::Idle.is_idle());
        assert!(!RunState::Collecting.is_idle());
        assert!(!RunState::Reporting.is_idle());
    }

    #[test]
    fn test_run_state_serde_snake_case() {
        let json = serde_json::to_string(&RunState::Collecting).unwrap();
        assert_eq!(json, "\"collecting\"");
    }
}
