//! Feature Normalization using pre-fit scaling parameters

use crate::error::ScalerError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Read-only transform from raw feature rows to normalized rows
pub trait FeatureNormalizer: Send + Sync {
    /// Width of the rows this normalizer accepts
    fn feature_count(&self) -> usize;

    /// Normalize every row of a feature matrix
    fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ScalerError>;
}

/// Versioned scaler artifact as exported by the training pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// Artifact version tag
    pub version: String,
    /// Declared number of features
    pub feature_count: usize,
    /// Per-column mean
    pub mean: Vec<f64>,
    /// Per-column scale (standard deviation)
    pub scale: Vec<f64>,
}

/// Z-score scaler: `(raw - mean) / scale` per column
#[derive(Debug, Clone)]
pub struct StandardScaler {
    version: String,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Validate parameters against the expected feature layout.
    ///
    /// A zero scale marks a constant column during fitting and is replaced
    /// by 1.0 so the column only gets centered.
    pub fn from_params(params: ScalerParams, expected: usize) -> Result<Self, ScalerError> {
        let counts = [
            ("feature_count", params.feature_count),
            ("mean", params.mean.len()),
            ("scale", params.scale.len()),
        ];
        for (field, actual) in counts {
            if actual != expected {
                return Err(ScalerError::FeatureCountMismatch {
                    field,
                    expected,
                    actual,
                });
            }
        }

        for (field, values) in [("mean", &params.mean), ("scale", &params.scale)] {
            if let Some(index) = values.iter().position(|v| !v.is_finite()) {
                return Err(ScalerError::NonFiniteParameter { field, index });
            }
        }

        let scale = params
            .scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();

        info!(
            "Loaded feature scaler version {} ({} features)",
            params.version, expected
        );

        Ok(Self {
            version: params.version,
            mean: params.mean,
            scale,
        })
    }

    /// Load a JSON parameter artifact from disk
    pub fn load(path: impl AsRef<Path>, expected: usize) -> Result<Self, ScalerError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ScalerError::Load(format!("{}: {}", path.display(), e)))?;
        let params: ScalerParams =
            serde_json::from_str(&content).map_err(|e| ScalerError::Load(e.to_string()))?;
        Self::from_params(params, expected)
    }

    /// Identity scaler (mean 0, scale 1), for running without an artifact
    pub fn identity(feature_count: usize) -> Self {
        Self {
            version: "identity".to_string(),
            mean: vec![0.0; feature_count],
            scale: vec![1.0; feature_count],
        }
    }

    /// Artifact version tag
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl FeatureNormalizer for StandardScaler {
    fn feature_count(&self) -> usize {
        self.mean.len()
    }

    fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ScalerError> {
        rows.iter()
            .enumerate()
            .map(|(row, values)| {
                if values.len() != self.mean.len() {
                    return Err(ScalerError::RowWidthMismatch {
                        row,
                        expected: self.mean.len(),
                        actual: values.len(),
                    });
                }
                Ok(values
                    .iter()
                    .zip(self.mean.iter().zip(&self.scale))
                    .map(|(v, (m, s))| (v - m) / s)
                    .collect())
            })
            .collect()
    }
}
