//! Source collection with per-source failure isolation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use medsync_connector::{
    MedicationRecord, PatientId, SourceAdapter, SourceBinding, SourceType,
};

use crate::config::CollectorConfig;
use crate::traits::RecordStore;

/// Name used for the implicit internal source in batches and reports.
const INTERNAL_SOURCE: &str = "local-store";

/// One successfully collected source batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceBatch {
    /// Kind of source.
    pub source_type: SourceType,
    /// Name of the system the batch came from.
    pub system: String,
    /// Records returned by the source.
    pub records: Vec<MedicationRecord>,
    /// When the batch was fetched.
    pub fetched_at: DateTime<Utc>,
}

/// One failed source fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionError {
    /// Name of the system that failed.
    pub source: String,
    /// Error description.
    pub error: String,
    /// When the failure was observed.
    pub occurred_at: DateTime<Utc>,
}

/// Everything one pass collected: successful batches plus per-source
/// failures. A failure never removes another source's batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectedSources {
    /// Successfully collected batches, in collection order.
    pub sources: Vec<SourceBatch>,
    /// Per-source failures.
    pub errors: Vec<CollectionError>,
}

impl CollectedSources {
    /// Total number of records across all batches.
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.sources.iter().map(|b| b.records.len()).sum()
    }

    /// Iterate all records in collection order.
    pub fn all_records(&self) -> impl Iterator<Item = &MedicationRecord> {
        self.sources.iter().flat_map(|b| b.records.iter())
    }
}

/// Collects record batches from every configured source.
///
/// Each fetch runs under a bounded timeout; a slow or failing source
/// contributes an error entry and collection moves on. The local record
/// store is always collected last as the implicit internal source.
pub struct SourceCollector {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    store: Arc<dyn RecordStore>,
    config: CollectorConfig,
}

impl SourceCollector {
    /// Create a collector with default tuning.
    #[must_use]
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, store: Arc<dyn RecordStore>) -> Self {
        Self::with_config(adapters, store, CollectorConfig::default())
    }

    /// Create a collector with custom tuning.
    #[must_use]
    pub fn with_config(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        store: Arc<dyn RecordStore>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            adapters,
            store,
            config,
        }
    }

    /// Collect batches for a patient from the bound sources, then the
    /// internal store.
    #[instrument(skip(self, bindings), fields(patient_id = %patient_id))]
    pub async fn collect(
        &self,
        patient_id: PatientId,
        bindings: &[SourceBinding],
    ) -> CollectedSources {
        let mut collected = CollectedSources::default();

        for binding in bindings {
            match self.find_adapter(binding) {
                Some(adapter) => {
                    self.fetch_one(patient_id, adapter.as_ref(), &mut collected)
                        .await;
                }
                None => {
                    warn!(
                        source_type = %binding.source_type,
                        system = %binding.system,
                        "No adapter registered for configured source"
                    );
                    collected.errors.push(CollectionError {
                        source: binding.system.clone(),
                        error: format!(
                            "no adapter registered for {} source '{}'",
                            binding.source_type, binding.system
                        ),
                        occurred_at: Utc::now(),
                    });
                }
            }
        }

        self.fetch_internal(patient_id, &mut collected).await;

        debug!(
            sources = collected.sources.len(),
            errors = collected.errors.len(),
            records = collected.total_records(),
            "Collection finished"
        );

        collected
    }

    fn find_adapter(&self, binding: &SourceBinding) -> Option<&Arc<dyn SourceAdapter>> {
        self.adapters.iter().find(|a| {
            a.source_type() == binding.source_type && a.system_name() == binding.system
        })
    }

    async fn fetch_one(
        &self,
        patient_id: PatientId,
        adapter: &dyn SourceAdapter,
        collected: &mut CollectedSources,
    ) {
        let system = adapter.system_name().to_string();
        let timeout = self.config.fetch_timeout();

        match tokio::time::timeout(timeout, adapter.fetch_records(patient_id)).await {
            Ok(Ok(records)) => {
                debug!(system = %system, count = records.len(), "Fetched source batch");
                collected.sources.push(SourceBatch {
                    source_type: adapter.source_type(),
                    system,
                    records,
                    fetched_at: Utc::now(),
                });
            }
            Ok(Err(e)) => {
                warn!(system = %system, error = %e, "Source fetch failed");
                collected.errors.push(CollectionError {
                    source: system,
                    error: e.to_string(),
                    occurred_at: Utc::now(),
                });
            }
            Err(_) => {
                warn!(
                    system = %system,
                    timeout_secs = self.config.fetch_timeout_secs,
                    "Source fetch timed out"
                );
                collected.errors.push(CollectionError {
                    source: system,
                    error: format!(
                        "fetch timed out after {} seconds",
                        self.config.fetch_timeout_secs
                    ),
                    occurred_at: Utc::now(),
                });
            }
        }
    }

    async fn fetch_internal(&self, patient_id: PatientId, collected: &mut CollectedSources) {
        let timeout = self.config.fetch_timeout();

        match tokio::time::timeout(timeout, self.store.current_records(patient_id)).await {
            Ok(Ok(records)) => {
                debug!(count = records.len(), "Fetched internal records");
                collected.sources.push(SourceBatch {
                    source_type: SourceType::Internal,
                    system: INTERNAL_SOURCE.to_string(),
                    records,
                    fetched_at: Utc::now(),
                });
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Internal record fetch failed");
                collected.errors.push(CollectionError {
                    source: INTERNAL_SOURCE.to_string(),
                    error: e.to_string(),
                    occurred_at: Utc::now(),
                });
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.config.fetch_timeout_secs,
                    "Internal record fetch timed out"
                );
                collected.errors.push(CollectionError {
                    source: INTERNAL_SOURCE.to_string(),
                    error: format!(
                        "fetch timed out after {} seconds",
                        self.config.fetch_timeout_secs
                    ),
                    occurred_at: Utc::now(),
                });
            }
        }
    }
}
