//! Activity Inference Engine
//!
//! Assembles per-window features into sequences and classifies them with an
//! ONNX model executed by tract.

mod activity;
mod classifier;
mod sequencer;

pub use activity::{ActivityRecord, ActivityType, SubjectId};
pub use classifier::{ActivityClassifier, Classification, MockClassifier, OnnxClassifier};
pub use sequencer::{Sequence, SequenceAssembler, DEFAULT_SEQUENCE_LENGTH};

use thiserror::Error;

/// Errors during inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoadError(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: String, actual: String },
    #[error("Invalid model output: {0}")]
    InvalidOutput(String),
}
