//! Validation Error Types

use thiserror::Error;

/// Errors while turning a raw request payload into samples
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// Missing required field
    #[error("Sample {index}: missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    /// Timestamp could not be parsed
    #[error("Sample {index}: unparseable timestamp '{value}'")]
    InvalidTimestamp { index: usize, value: String },

    /// Batch exceeds the configured sample limit
    #[error("Batch of {actual} samples exceeds limit of {limit}")]
    BatchTooLarge { actual: usize, limit: usize },
}

/// Errors raised by the feature scaler contract
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScalerError {
    /// Parameter vector length disagrees with the feature layout
    #[error("Scaler {field} has {actual} entries, expected {expected}")]
    FeatureCountMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A parameter is NaN or infinite
    #[error("Scaler {field}[{index}] is not finite")]
    NonFiniteParameter { field: &'static str, index: usize },

    /// A row handed to transform has the wrong width
    #[error("Row {row} has {actual} features, expected {expected}")]
    RowWidthMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// Parameter artifact could not be read
    #[error("Failed to load scaler parameters: {0}")]
    Load(String),
}
