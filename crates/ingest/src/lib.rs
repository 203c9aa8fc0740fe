//! Source ingestion — normalizes raw platform exports into canonical
//! records, consolidates them into one dataset, and fetches raw rows from
//! platform clients with per-source failure tolerance.

pub mod consolidator;
pub mod fetch;
pub mod normalizer;

pub use consolidator::Consolidator;
pub use fetch::{CredentialHandle, CredentialResolver, DataSourceClient, SourceHub, SourceOutcome};
pub use normalizer::{NormalizedBatch, RawRow, RecordNormalizer};
