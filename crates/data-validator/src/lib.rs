//! Data Validation and Normalization
//!
//! Parses raw sensor batches into chronological samples and applies the
//! pre-fit feature scaler consumed by the activity classifier.

mod error;
mod normalizer;
mod sample;
mod validator;

pub use error::{ScalerError, ValidationError};
pub use normalizer::{FeatureNormalizer, ScalerParams, StandardScaler};
pub use sample::{Axis, Sample, SampleBatch, Vector3};
pub use validator::{parse_timestamp, ValidationConfig, Validator};
