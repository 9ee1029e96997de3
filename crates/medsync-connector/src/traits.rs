//! Source adapter trait.

use async_trait::async_trait;

use crate::error::ConnectorResult;
use crate::ids::PatientId;
use crate::record::MedicationRecord;
use crate::types::SourceType;

/// A source of medication records for a patient.
///
/// Implementations wrap one concrete external system (an EHR endpoint, a
/// pharmacy API). The reconciliation engine calls `fetch_records` once per
/// pass under a bounded timeout; any error is recorded as a per-source
/// failure and never aborts collection from the remaining sources.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Get the kind of source this adapter serves.
    fn source_type(&self) -> SourceType;

    /// Get the name of the concrete system this adapter talks to.
    fn system_name(&self) -> &str;

    /// Fetch the current medication records for a patient.
    async fn fetch_records(&self, patient_id: PatientId)
        -> ConnectorResult<Vec<MedicationRecord>>;

    /// Test connectivity to the source system.
    ///
    /// A lightweight diagnostic hook; the engine never calls this on the
    /// reconciliation path.
    async fn test_connection(&self) -> ConnectorResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectorError;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockAdapter {
        system: String,
        healthy: AtomicBool,
    }

    impl MockAdapter {
        fn new(system: &str) -> Self {
            Self {
                system: system.to_string(),
                healthy: AtomicBool::new(true),
            }
        }
    }

    #[async_trait]
    impl SourceAdapter for MockAdapter {
        fn source_type(&self) -> SourceType {
            SourceType::Ehr
        }

        fn system_name(&self) -> &str {
            &self.system
        }

        async fn fetch_records(
            &self,
            _patient_id: PatientId,
        ) -> ConnectorResult<Vec<MedicationRecord>> {
            if self.healthy.load(Ordering::SeqCst) {
                Ok(vec![MedicationRecord::new(
                    SourceType::Ehr,
                    self.system.clone(),
                    "Atorvastatin",
                    Utc::now(),
                )])
            } else {
                Err(ConnectorError::unavailable("not healthy"))
            }
        }
    }

    #[tokio::test]
    async fn test_mock_adapter_fetch() {
        let adapter = MockAdapter::new("epic-test");
        assert_eq!(adapter.source_type(), SourceType::Ehr);
        assert_eq!(adapter.system_name(), "epic-test");

        let records = adapter.fetch_records(PatientId::new()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(adapter.test_connection().await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_adapter_failure() {
        let adapter = MockAdapter::new("epic-test");
        adapter.healthy.store(false, Ordering::SeqCst);

        let err = adapter.fetch_records(PatientId::new()).await.unwrap_err();
        assert!(err.is_transient());
    }
}
