//! Feature Vector Assembly

use crate::statistics::{StatisticalFeatures, StatisticsError, DESCRIPTORS_PER_AXIS};
use crate::windowing::{create_windows, window_spans, WindowConfig, WindowSpan};
use data_validator::{Axis, SampleBatch};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Number of features in the vector (12 descriptors x 6 axes)
pub const FEATURE_DIMENSION: usize = DESCRIPTORS_PER_AXIS * Axis::ALL.len();

/// Feature extraction errors, located by axis and window
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("axis {axis}, window {window}: {source}")]
    Window {
        axis: Axis,
        window: usize,
        #[source]
        source: StatisticsError,
    },
    #[error("invalid window geometry: size {window_size}, overlap {overlap}")]
    InvalidConfig { window_size: usize, overlap: f64 },
}

/// Feature vector for one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Feature values (72 dimensions, axis-major)
    pub values: Vec<f64>,
    /// Index of the window within its batch
    pub window_index: usize,
    /// Timestamps of the window's first and last sample
    pub span: WindowSpan,
}

impl FeatureVector {
    /// The 12 descriptors of one axis
    pub fn axis(&self, axis: Axis) -> &[f64] {
        let offset = axis as usize * DESCRIPTORS_PER_AXIS;
        &self.values[offset..offset + DESCRIPTORS_PER_AXIS]
    }
}

/// Feature extractor that windows a sample batch and summarizes each window
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: WindowConfig,
}

impl FeatureExtractor {
    /// Create a new feature extractor
    pub fn new(config: WindowConfig) -> Result<Self, FeatureError> {
        if !config.is_valid() {
            return Err(FeatureError::InvalidConfig {
                window_size: config.window_size,
                overlap: config.overlap,
            });
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Extract one feature vector per window. A batch shorter than one window
    /// yields an empty list.
    pub fn extract_batch(&self, batch: &SampleBatch) -> Result<Vec<FeatureVector>, FeatureError> {
        let spans = window_spans(&batch.timestamps(), &self.config);
        let mut vectors: Vec<FeatureVector> = spans
            .into_iter()
            .enumerate()
            .map(|(window_index, span)| FeatureVector {
                values: Vec::with_capacity(FEATURE_DIMENSION),
                window_index,
                span,
            })
            .collect();

        for axis in Axis::ALL {
            let column = batch.axis_values(axis);
            for (window, values) in create_windows(&column, &self.config).into_iter().enumerate() {
                let stats = StatisticalFeatures::compute(values)
                    .map_err(|source| FeatureError::Window { axis, window, source })?;
                vectors[window].values.extend_from_slice(&stats.to_array());
            }
        }

        debug!(
            "Extracted {} feature vectors from {} samples",
            vectors.len(),
            batch.len()
        );

        Ok(vectors)
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self {
            config: WindowConfig::default(),
        }
    }
}
