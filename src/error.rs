//! Crate-wide error type

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the training pipeline
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("batch contains no examples")]
    EmptyBatch,

    #[error("configuration error: {0}")]
    Config(String),
}
