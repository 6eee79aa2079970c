//! Sensor sample types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tri-axial reading. Malformed components are stored as NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    /// All components NaN (missing or malformed reading)
    pub const MISSING: Vector3 = Vector3 {
        x: f64::NAN,
        y: f64::NAN,
        z: f64::NAN,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Sensor axis. Declaration order is the feature layout order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    AccX,
    AccY,
    AccZ,
    RotX,
    RotY,
    RotZ,
}

impl Axis {
    /// Axes in the order their features are concatenated
    pub const ALL: [Axis; 6] = [
        Axis::AccX,
        Axis::AccY,
        Axis::AccZ,
        Axis::RotX,
        Axis::RotY,
        Axis::RotZ,
    ];

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::AccX => "acc_x",
            Axis::AccY => "acc_y",
            Axis::AccZ => "acc_z",
            Axis::RotX => "rot_x",
            Axis::RotY => "rot_y",
            Axis::RotZ => "rot_z",
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped accelerometer + gyroscope reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub acceleration: Vector3,
    pub rotation: Vector3,
}

impl Sample {
    /// Value of a single axis
    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::AccX => self.acceleration.x,
            Axis::AccY => self.acceleration.y,
            Axis::AccZ => self.acceleration.z,
            Axis::RotX => self.rotation.x,
            Axis::RotY => self.rotation.y,
            Axis::RotZ => self.rotation.z,
        }
    }
}

/// Chronologically ordered samples from one ingestion call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleBatch {
    samples: Vec<Sample>,
}

impl SampleBatch {
    /// Build a batch, stably sorting samples by timestamp
    pub fn new(mut samples: Vec<Sample>) -> Self {
        samples.sort_by_key(|s| s.timestamp);
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Column of one axis across the batch
    pub fn axis_values(&self, axis: Axis) -> Vec<f64> {
        self.samples.iter().map(|s| s.axis(axis)).collect()
    }

    /// Timestamps across the batch
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    /// First and last timestamp of the batch
    pub fn bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_at(secs: i64, acc_x: f64) -> Sample {
        Sample {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            acceleration: Vector3::new(acc_x, 0.0, 9.8),
            rotation: Vector3::new(0.1, 0.2, 0.3),
        }
    }

    #[test]
    fn test_batch_sorts_chronologically() {
        let batch = SampleBatch::new(vec![sample_at(3, 3.0), sample_at(1, 1.0), sample_at(2, 2.0)]);
        assert_eq!(batch.axis_values(Axis::AccX), vec![1.0, 2.0, 3.0]);

        let (first, last) = batch.bounds().unwrap();
        assert_eq!(first.timestamp(), 1);
        assert_eq!(last.timestamp(), 3);
    }

    #[test]
    fn test_axis_order() {
        let sample = sample_at(0, 1.5);
        let values: Vec<f64> = Axis::ALL.iter().map(|a| sample.axis(*a)).collect();
        assert_eq!(values, vec![1.5, 0.0, 9.8, 0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_empty_batch_has_no_bounds() {
        assert!(SampleBatch::default().bounds().is_none());
    }
}
