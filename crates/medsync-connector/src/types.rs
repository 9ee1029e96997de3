//! Common types for source configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of system a medication record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Electronic health record system.
    Ehr,
    /// Pharmacy dispensing system.
    Pharmacy,
    /// Locally stored record set.
    Internal,
}

impl SourceType {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Ehr => "ehr",
            SourceType::Pharmacy => "pharmacy",
            SourceType::Internal => "internal",
        }
    }

    /// Check whether this source is an external system.
    ///
    /// The internal source is always collected implicitly and is never
    /// part of a patient's configured source list.
    #[must_use]
    pub fn is_external(&self) -> bool {
        !matches!(self, SourceType::Internal)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ehr" => Ok(SourceType::Ehr),
            "pharmacy" => Ok(SourceType::Pharmacy),
            "internal" => Ok(SourceType::Internal),
            _ => Err(format!("Unknown source type: {s}")),
        }
    }
}

/// One configured source for a patient: a source kind plus the concrete
/// system it is served by (e.g. `ehr` / `"epic-prod"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBinding {
    /// Kind of source.
    pub source_type: SourceType,
    /// Name of the concrete system serving this source.
    pub system: String,
}

impl SourceBinding {
    /// Create a new source binding.
    #[must_use]
    pub fn new(source_type: SourceType, system: impl Into<String>) -> Self {
        Self {
            source_type,
            system: system.into(),
        }
    }
}
