use thiserror::Error;

pub type AdPulseResult<T> = Result<T, AdPulseError>;

#[derive(Error, Debug)]
pub enum AdPulseError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A mandatory identifying column is structurally absent from a source.
    /// Aborts normalization of that source only; other sources proceed.
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
