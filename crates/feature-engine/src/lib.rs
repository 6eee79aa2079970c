//! Feature Engineering Engine
//!
//! Segments sensor batches into overlapping windows and computes the
//! per-axis statistical descriptors consumed by the activity classifier.

mod features;
mod statistics;
mod windowing;

pub use features::{FeatureError, FeatureExtractor, FeatureVector, FEATURE_DIMENSION};
pub use statistics::{StatisticalFeatures, StatisticsError, DESCRIPTORS_PER_AXIS};
pub use windowing::{batch_span, create_windows, window_count, window_spans, WindowConfig, WindowSpan};
