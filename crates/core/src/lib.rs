pub mod config;
pub mod error;
pub mod types;

pub use config::{AnalysisConfig, AppConfig, FunnelRuleConfig};
pub use error::{AdPulseError, AdPulseResult};
pub use types::{
    AnomalyKind, ConsolidatedDataset, DataAnomaly, DateRange, Platform, PlatformRecord,
    UnavailableSource,
};
