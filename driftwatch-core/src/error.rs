//! Error types for the driftwatch-core crate.

use thiserror::Error;

/// Top-level error type for drift calculations.
#[derive(Debug, Error)]
pub enum DriftError {
    /// Invalid calculator construction parameters (raised at construction time).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input data rejected: empty tables, missing columns, mismatched feature types.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An operation that requires fitted artifacts was called before `fit`.
    #[error("Calculator not fitted: {0}")]
    NotFitted(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A data source could not be parsed into a batch.
    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl DriftError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_fitted(msg: impl Into<String>) -> Self {
        Self::NotFitted(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    /// Data-validation error for feature columns absent from a dataset.
    pub fn missing_columns(missing: &[String]) -> Self {
        Self::InvalidInput(format!("data does not contain columns {missing:?}"))
    }

    /// Data-validation error for an empty dataset.
    pub fn empty_data() -> Self {
        Self::InvalidInput("data contains no rows. Please provide a valid data set".to_string())
    }
}
