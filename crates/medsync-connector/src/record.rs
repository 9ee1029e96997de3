//! Raw medication record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::SourceType;

/// One medication record as returned by one source.
///
/// Records are immutable once collected: the engine clones them for
/// grouping and resolution but never mutates the collected values. The
/// `ndc_code` and `rxcui_code` identifiers drive canonical grouping;
/// `dosage`, `frequency`, `status` and `start_date` are the tracked
/// fields compared during conflict detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationRecord {
    /// Kind of system this record came from.
    pub source_type: SourceType,
    /// Name of the concrete system this record came from.
    pub source_system: String,
    /// Display name of the medication.
    pub name: String,
    /// Dosage as reported by the source (e.g. "10mg").
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dosage: Option<String>,
    /// Administration frequency (e.g. "once daily").
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub frequency: Option<String>,
    /// Prescription status (e.g. "active", "discontinued").
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<String>,
    /// When the prescription started.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub start_date: Option<DateTime<Utc>>,
    /// National Drug Code, when the source provides one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ndc_code: Option<String>,
    /// RxNorm concept identifier, when the source provides one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rxcui_code: Option<String>,
    /// When this record was collected from the source.
    pub collected_at: DateTime<Utc>,
}

impl MedicationRecord {
    /// Create a new record with only the required fields set.
    #[must_use]
    pub fn new(
        source_type: SourceType,
        source_system: impl Into<String>,
        name: impl Into<String>,
        collected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_type,
            source_system: source_system.into(),
            name: name.into(),
            dosage: None,
            frequency: None,
            status: None,
            start_date: None,
            ndc_code: None,
            rxcui_code: None,
            collected_at,
        }
    }

    /// Set the dosage.
    #[must_use]
    pub fn with_dosage(mut self, dosage: impl Into<String>) -> Self {
        self.dosage = Some(dosage.into());
        self
    }

    /// Set the frequency.
    #[must_use]
    pub fn with_frequency(mut self, frequency: impl Into<String>) -> Self {
        self.frequency = Some(frequency.into());
        self
    }

    /// Set the status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Set the start date.
    #[must_use]
    pub fn with_start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.start_date = Some(start_date);
        self
    }

    /// Set the NDC code.
    #[must_use]
    pub fn with_ndc(mut self, ndc: impl Into<String>) -> Self {
        self.ndc_code = Some(ndc.into());
        self
    }

    /// Set the RXCUI code.
    #[must_use]
    pub fn with_rxcui(mut self, rxcui: impl Into<String>) -> Self {
        self.rxcui_code = Some(rxcui.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let now = Utc::now();
        let record = MedicationRecord::new(SourceType::Ehr, "epic-prod", "Lisinopril", now)
            .with_dosage("10mg")
            .with_frequency("once daily")
            .with_status("active")
            .with_ndc("0069-2587-10");

        assert_eq!(record.source_type, SourceType::Ehr);
        assert_eq!(record.name, "Lisinopril");
        assert_eq!(record.dosage.as_deref(), Some("10mg"));
        assert_eq!(record.ndc_code.as_deref(), Some("0069-2587-10"));
        assert!(record.rxcui_code.is_none());
        assert_eq!(record.collected_at, now);
    }

    #[test]
    fn test_record_serde_omits_missing_fields() {
        let record =
            MedicationRecord::new(SourceType::Pharmacy, "cvs-retail", "Metformin", Utc::now());
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("ndc_code"));
        assert!(!json.contains("dosage"));

        let back: MedicationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
