//! Pipeline Error Types

use data_validator::{ScalerError, ValidationError};
use feature_engine::FeatureError;
use inference_engine::InferenceError;
use storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed payload: missing fields, bad timestamps, wrong shape
    #[error("Invalid input: {0}")]
    InputShape(#[from] ValidationError),

    /// Feature extraction failed for a window
    #[error("Feature extraction failed: {0}")]
    Feature(#[from] FeatureError),

    /// Scaler or classifier disagrees with the feature layout
    #[error("Model contract violated: {0}")]
    ModelContract(String),

    #[error("Classification failed: {0}")]
    Classification(#[from] InferenceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    #[error("Subject state unavailable: {0}")]
    StatePoisoned(String),
}

impl From<ScalerError> for PipelineError {
    fn from(e: ScalerError) -> Self {
        PipelineError::ModelContract(e.to_string())
    }
}

impl PipelineError {
    /// Whether the caller's payload is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::InputShape(_) | PipelineError::Feature(_))
    }

    /// Metric label
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InputShape(_) => "input_shape",
            PipelineError::Feature(_) => "feature",
            PipelineError::ModelContract(_) => "model_contract",
            PipelineError::Classification(_) => "classification",
            PipelineError::Storage(_) => "storage",
            PipelineError::InvalidConfig(_) => "config",
            PipelineError::StatePoisoned(_) => "state",
        }
    }
}
