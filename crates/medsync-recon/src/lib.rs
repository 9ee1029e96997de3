//! # Medication Reconciliation Engine
//!
//! Periodic multi-source reconciliation of medication records for one
//! patient at a time.
//!
//! ## Overview
//!
//! The engine provides:
//! - Per-source collection with bounded timeouts and failure isolation
//! - Canonical key derivation (NDC, RXCUI, normalized name) for
//!   cross-source grouping
//! - Field-level conflict detection with severity classification
//! - A closed set of resolution policies, including explicit manual review
//! - Strictly serialized passes per patient with concurrent patients
//! - Per-patient scheduling with tiered cadences and skip-on-busy ticks
//! - Rolling run history and typed completion/failure events
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         MedSyncService                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌──────────────┐   tick   ┌──────────────────────────────────┐  │
//! │  │ SyncScheduler│─────────►│       ReconciliationRunner       │  │
//! │  └──────────────┘          │                                  │  │
//! │                            │  collect → detect → resolve →    │  │
//! │  ┌──────────────┐  gate    │        persist → report          │  │
//! │  │ SyncJobStore │◄────────►│                                  │  │
//! │  └──────────────┘          └───────┬──────────────┬───────────┘  │
//! │                                    │              │              │
//! │                            ┌───────▼─────┐  ┌─────▼──────────┐   │
//! │                            │ SourceAdapter│  │ RecordStore /  │   │
//! │                            │   (EHR, …)  │  │   Notifier     │   │
//! │                            └─────────────┘  └────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use medsync_recon::{MedSyncService, PatientSyncConfig};
//! use medsync_connector::{SourceBinding, SourceType};
//!
//! let service = MedSyncService::new(adapters, record_store, Some(notifier));
//!
//! service.initialize(patient_id, PatientSyncConfig::new(vec![
//!     SourceBinding::new(SourceType::Ehr, "epic-prod"),
//!     SourceBinding::new(SourceType::Pharmacy, "cvs-retail"),
//! ]))?;
//!
//! // Trigger a pass outside the schedule
//! let report = service.run_once(patient_id).await?;
//!
//! // Inspect status
//! let snapshot = service.status(patient_id)?;
//! ```

pub mod collector;
pub mod config;
pub mod detect;
pub mod error;
pub mod events;
pub mod key;
pub mod report;
pub mod resolve;
pub mod runner;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod traits;
pub mod types;

pub use collector::{CollectedSources, CollectionError, SourceBatch, SourceCollector};
pub use config::{CollectorConfig, PatientSyncConfig};
pub use detect::{ConflictDetector, ConflictValue, FieldConflict, GroupAnalysis};
pub use error::{ReconError, ReconResult};
pub use events::{EventPublisher, SyncEvent};
pub use key::{derive_key, CanonicalKey};
pub use report::{SyncHistory, SyncReport};
pub use resolve::{ConflictResolver, ResolutionOutcome};
pub use runner::ReconciliationRunner;
pub use scheduler::SyncScheduler;
pub use service::MedSyncService;
pub use store::{JobSnapshot, SyncJob, SyncJobStore};
pub use traits::{ApplyReceipt, Notifier, RecordStore};
pub use types::{
    ConflictKind, ConflictSeverity, FrequencyTier, JobStatus, ResolutionHint, ResolutionMethod,
    ResolutionPolicy, RunState,
};
