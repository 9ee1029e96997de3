//! # Source Adapter Framework
//!
//! Trait definitions and shared types for medication record sources.
//!
//! A *source* is any external system that can return the current set of
//! medication records for a patient: an EHR integration, a pharmacy
//! dispensing system, or the local record store acting as the implicit
//! internal source. Adapters implement [`traits::SourceAdapter`] and are
//! registered with the reconciliation engine, which treats every adapter
//! failure as a per-source condition rather than a fatal one.

pub mod error;
pub mod ids;
pub mod record;
pub mod traits;
pub mod types;

pub use error::{ConnectorError, ConnectorResult};
pub use ids::{PatientId, RunId, SourceId};
pub use record::MedicationRecord;
pub use traits::SourceAdapter;
pub use types::{SourceBinding, SourceType};
