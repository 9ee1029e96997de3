//! Sync configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use medsync_connector::SourceBinding;

use crate::error::{ReconError, ReconResult};
use crate::types::{FrequencyTier, ResolutionPolicy};

/// Per-patient sync configuration supplied at `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSyncConfig {
    /// External sources to collect from, in collection order.
    pub sources: Vec<SourceBinding>,
    /// Scheduling cadence tier.
    #[serde(default = "default_frequency")]
    pub frequency: FrequencyTier,
    /// Resolution policy applied to conflicted groups.
    #[serde(default = "default_policy")]
    pub policy: ResolutionPolicy,
    /// Whether to schedule automatic passes. Manual passes via
    /// `run_once` work either way.
    #[serde(default = "default_auto_reconcile")]
    pub auto_reconcile: bool,
}

fn default_frequency() -> FrequencyTier {
    FrequencyTier::Standard
}

fn default_policy() -> ResolutionPolicy {
    ResolutionPolicy::FirstSeen
}

fn default_auto_reconcile() -> bool {
    true
}

impl PatientSyncConfig {
    /// Create a configuration with default tier and policy.
    #[must_use]
    pub fn new(sources: Vec<SourceBinding>) -> Self {
        Self {
            sources,
            frequency: default_frequency(),
            policy: default_policy(),
            auto_reconcile: default_auto_reconcile(),
        }
    }

    /// Set the frequency tier.
    #[must_use]
    pub fn with_frequency(mut self, frequency: FrequencyTier) -> Self {
        self.frequency = frequency;
        self
    }

    /// Set the resolution policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set whether automatic passes are scheduled.
    #[must_use]
    pub fn with_auto_reconcile(mut self, auto_reconcile: bool) -> Self {
        self.auto_reconcile = auto_reconcile;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ReconResult<()> {
        if self.sources.is_empty() {
            return Err(ReconError::configuration(
                "at least one source must be configured",
            ));
        }
        for binding in &self.sources {
            if !binding.source_type.is_external() {
                return Err(ReconError::configuration(format!(
                    "source '{}' is internal; the local store is always collected implicitly",
                    binding.system
                )));
            }
            if binding.system.trim().is_empty() {
                return Err(ReconError::configuration("source system name is empty"));
            }
        }
        Ok(())
    }
}

/// Collector tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Per-source fetch timeout in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

impl CollectorConfig {
    /// The per-source fetch timeout as a `Duration`.
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medsync_connector::SourceType;

    #[test]
    fn test_config_defaults() {
        let config =
            PatientSyncConfig::new(vec![SourceBinding::new(SourceType::Ehr, "epic-prod")]);
        assert_eq!(config.frequency, FrequencyTier::Standard);
        assert_eq!(config.policy, ResolutionPolicy::FirstSeen);
        assert!(config.auto_reconcile);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialize_with_defaults() {
        let json = r#"{"sources": [{"source_type": "ehr", "system": "epic-prod"}]}"#;
        let config: PatientSyncConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.frequency, FrequencyTier::Standard);
        assert!(config.auto_reconcile);
    }

    #[test]
    fn test_config_rejects_empty_sources() {
        let config = PatientSyncConfig::new(vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_internal_source() {
        let config =
            PatientSyncConfig::new(vec![SourceBinding::new(SourceType::Internal, "local")]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_blank_system() {
        let config = PatientSyncConfig::new(vec![SourceBinding::new(SourceType::Ehr, "  ")]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_collector_config_default_timeout() {
        let config = CollectorConfig::default();
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
    }
}
