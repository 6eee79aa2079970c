//! Statistical Features Computation

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of descriptors computed per axis window
pub const DESCRIPTORS_PER_AXIS: usize = 12;

/// Errors computing statistics over a window
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatisticsError {
    #[error("window is empty")]
    EmptyWindow,
    #[error("window value at position {position} is not finite")]
    NonFinite { position: usize },
}

/// Statistical features for one axis window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticalFeatures {
    /// Mean value
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    /// Root mean square
    pub rms: f64,
    /// Maximum value
    pub max: f64,
    /// Minimum value
    pub min: f64,
    /// Median (50th percentile)
    pub median: f64,
    /// Adjacent pairs whose sign (-1, 0, +1) differs
    pub sign_changes: usize,
    /// Skewness (asymmetry), biased moment estimator
    pub skewness: f64,
    /// Excess kurtosis (tailedness), biased moment estimator
    pub kurtosis: f64,
    /// 25th percentile
    pub p25: f64,
    /// 75th percentile
    pub p75: f64,
    /// Zero-lag autocorrelation (sum of squares)
    pub autocorrelation: f64,
}

impl StatisticalFeatures {
    /// Compute statistical features from a window of values
    pub fn compute(values: &[f64]) -> Result<Self, StatisticsError> {
        if values.is_empty() {
            return Err(StatisticsError::EmptyWindow);
        }
        if let Some(position) = values.iter().position(|v| !v.is_finite()) {
            return Err(StatisticsError::NonFinite { position });
        }

        let n = values.len() as f64;

        // Mean
        let mean = values.iter().sum::<f64>() / n;

        // Min/Max
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        // Central moments
        let mut m2 = 0.0;
        let mut m3 = 0.0;
        let mut m4 = 0.0;

        for &v in values {
            let d = v - mean;
            m2 += d * d;
            m3 += d * d * d;
            m4 += d * d * d * d;
        }

        let variance = m2 / n;
        let std_dev = variance.sqrt();

        // Skewness: E[(X-μ)³] / σ³
        let skewness = if variance > 0.0 {
            (m3 / n) / variance.powf(1.5)
        } else {
            0.0
        };

        // Kurtosis: E[(X-μ)⁴] / σ⁴ - 3 (excess kurtosis)
        let kurtosis = if variance > 0.0 {
            (m4 / n) / (variance * variance) - 3.0
        } else {
            0.0
        };

        let sum_squares: f64 = values.iter().map(|v| v * v).sum();
        let rms = (sum_squares / n).sqrt();

        let sign_changes = values
            .windows(2)
            .filter(|pair| sign(pair[0]) != sign(pair[1]))
            .count();

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        Ok(Self {
            mean,
            std_dev,
            rms,
            max,
            min,
            median: percentile(&sorted, 50.0),
            sign_changes,
            skewness,
            kurtosis,
            p25: percentile(&sorted, 25.0),
            p75: percentile(&sorted, 75.0),
            autocorrelation: sum_squares,
        })
    }

    /// Descriptors in fixed output order
    pub fn to_array(&self) -> [f64; DESCRIPTORS_PER_AXIS] {
        [
            self.mean,
            self.std_dev,
            self.rms,
            self.max,
            self.min,
            self.median,
            self.sign_changes as f64,
            self.skewness,
            self.kurtosis,
            self.p25,
            self.p75,
            self.autocorrelation,
        ]
    }
}

fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

/// Percentile of ascending `sorted` data, linear interpolation between ranks
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_mean_computation() {
        let stats = StatisticalFeatures::compute(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert!(approx(stats.mean, 3.0));
        assert!(approx(stats.median, 3.0));
        assert!(approx(stats.p25, 2.0));
        assert!(approx(stats.p75, 4.0));
    }

    #[test]
    fn test_population_std_dev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let stats = StatisticalFeatures::compute(&values).unwrap();
        assert!(approx(stats.std_dev, 2.0));
        assert!(approx(stats.min, 2.0));
        assert!(approx(stats.max, 9.0));
    }

    #[test]
    fn test_rms_and_autocorrelation() {
        let stats = StatisticalFeatures::compute(&[3.0, -4.0]).unwrap();
        assert!(approx(stats.autocorrelation, 25.0));
        assert!(approx(stats.rms, (12.5f64).sqrt()));
    }

    #[test]
    fn test_interpolated_percentiles() {
        let stats = StatisticalFeatures::compute(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        // Ranks 0.75, 1.5, 2.25 over [1, 2, 3, 4]
        assert!(approx(stats.p25, 1.75));
        assert!(approx(stats.median, 2.5));
        assert!(approx(stats.p75, 3.25));
    }

    #[test]
    fn test_sign_changes_count_zero_as_its_own_sign() {
        let stats = StatisticalFeatures::compute(&[1.0, -1.0, 0.0, 0.0, 2.0, 3.0]).unwrap();
        // 1→-1, -1→0, 0→2
        assert_eq!(stats.sign_changes, 3);
    }

    #[test]
    fn test_skewness_and_kurtosis() {
        let stats = StatisticalFeatures::compute(&[1.0, 2.0, 3.0, 4.0, 10.0]).unwrap();
        assert!(stats.skewness > 0.0);

        let symmetric = StatisticalFeatures::compute(&[1.0, 2.0, 3.0]).unwrap();
        assert!(approx(symmetric.skewness, 0.0));
        // (2/3) / (2/3)^2 - 3
        assert!(approx(symmetric.kurtosis, -1.5));
    }

    #[test]
    fn test_constant_window() {
        let stats = StatisticalFeatures::compute(&[5.0; 10]).unwrap();
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.skewness, 0.0);
        assert_eq!(stats.kurtosis, 0.0);
        assert_eq!(stats.sign_changes, 0);
    }

    #[test]
    fn test_empty_values() {
        assert_eq!(StatisticalFeatures::compute(&[]), Err(StatisticsError::EmptyWindow));
    }

    #[test]
    fn test_non_finite_rejected() {
        assert_eq!(
            StatisticalFeatures::compute(&[1.0, f64::NAN, 2.0]),
            Err(StatisticsError::NonFinite { position: 1 })
        );
        assert!(StatisticalFeatures::compute(&[f64::INFINITY]).is_err());
    }

    #[test]
    fn test_deterministic() {
        let values: Vec<f64> = (0..50).map(|i| ((i as f64) * 0.37).sin() * 3.0).collect();
        let a = StatisticalFeatures::compute(&values).unwrap().to_array();
        let b = StatisticalFeatures::compute(&values).unwrap().to_array();
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }
}
