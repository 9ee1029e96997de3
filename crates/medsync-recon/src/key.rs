//! Canonical key derivation.
//!
//! Records referring to the same logical medication must group together
//! across sources even when the sources disagree on presentation. The
//! canonical key is the identity used for that grouping; derivation is
//! pure and deterministic so equal inputs always land in the same group.

use serde::{Deserialize, Serialize};
use std::fmt;

use medsync_connector::MedicationRecord;

/// Maximum length of the normalized-name portion of a key.
const MAX_NAME_KEY_LEN: usize = 24;

/// Deterministic identity string grouping the same logical medication
/// across sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// View the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derive the canonical key for a record.
///
/// Precedence: NDC code, then RXCUI code, then the normalized name.
/// Codes are normalized by stripping non-alphanumeric characters, so
/// `0069-2587-10` and `0069258710` share a key. Names are case-folded,
/// stripped of non-alphanumerics, and truncated to a fixed length.
/// Prefixes keep the three namespaces from colliding.
#[must_use]
pub fn derive_key(record: &MedicationRecord) -> CanonicalKey {
    if let Some(code) = normalize_code(record.ndc_code.as_deref()) {
        return CanonicalKey(format!("ndc:{code}"));
    }
    if let Some(code) = normalize_code(record.rxcui_code.as_deref()) {
        return CanonicalKey(format!("rxcui:{code}"));
    }
    CanonicalKey(format!("name:{}", normalize_name(&record.name)))
}

fn normalize_code(code: Option<&str>) -> Option<String> {
    let normalized: String = code?
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

fn normalize_name(name: &str) -> String {
    let mut normalized: String = name
        .to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    normalized.truncate(MAX_NAME_KEY_LEN);
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use medsync_connector::SourceType;

    fn record(name: &str) -> MedicationRecord {
        MedicationRecord::new(SourceType::Ehr, "epic-test", name, Utc::now())
    }

    #[test]
    fn test_ndc_takes_precedence() {
        let rec = record("Lisinopril").with_ndc("0069-2587-10").with_rxcui("12345");
        assert_eq!(derive_key(&rec).as_str(), "ndc:0069258710");
    }

    #[test]
    fn test_same_ndc_same_key_across_formatting() {
        let a = record("Lisinopril 10 MG Oral Tablet").with_ndc("0069-2587-10");
        let b = record("lisinopril").with_ndc("0069258710");
        assert_eq!(derive_key(&a), derive_key(&b));
    }

    #[test]
    fn test_rxcui_when_no_ndc() {
        let rec = record("Lisinopril").with_rxcui("314076");
        assert_eq!(derive_key(&rec).as_str(), "rxcui:314076");
    }

    #[test]
    fn test_name_fallback_normalized() {
        let a = record("Lisinopril 10mg");
        let b = record("LISINOPRIL 10 MG");
        assert_eq!(derive_key(&a), derive_key(&b));
        assert!(derive_key(&a).as_str().starts_with("name:"));
    }

    #[test]
    fn test_name_truncated() {
        let rec = record("Acetaminophen-Hydrocodone Bitartrate Extended Release");
        let key = derive_key(&rec);
        assert!(key.as_str().len() <= "name:".len() + 24);
    }

    #[test]
    fn test_empty_ndc_falls_through() {
        let rec = record("Metformin").with_ndc("--");
        assert!(derive_key(&rec).as_str().starts_with("name:"));
    }

    #[test]
    fn test_derivation_deterministic() {
        let rec = record("Warfarin").with_ndc("00056-0170-70");
        assert_eq!(derive_key(&rec), derive_key(&rec.clone()));
    }
}
