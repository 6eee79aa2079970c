//! Pipeline configuration

use feature_engine::WindowConfig;
use inference_engine::{SubjectId, DEFAULT_SEQUENCE_LENGTH};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Time range attributed to each classified record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampMode {
    /// First and last timestamp of the whole request batch
    #[default]
    BatchBounds,
    /// First and last timestamp of the newest window in the sequence
    PerWindow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Samples per window (default: 50)
    pub window_size: usize,
    /// Fraction of each window shared with the next (default: 0.5)
    pub overlap: f64,
    /// Windows per classified sequence (default: 3)
    pub sequence_length: usize,
    pub timestamp_mode: TimestampMode,
    /// Subject state is dropped after this long without samples
    pub subject_idle_timeout_secs: u64,
    /// Subject used when a request names none
    pub default_subject: String,
    /// Maximum samples accepted in one request
    pub max_batch_samples: usize,
    /// Capacity of the channel to the daily sweep
    pub event_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: 50,
            overlap: 0.5,
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
            timestamp_mode: TimestampMode::BatchBounds,
            subject_idle_timeout_secs: 3600,
            default_subject: "default".to_string(),
            max_batch_samples: 100_000,
            event_buffer: 1024,
        }
    }
}

impl PipelineConfig {
    pub fn window(&self) -> WindowConfig {
        WindowConfig::new(self.window_size, self.overlap)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.subject_idle_timeout_secs)
    }

    /// Requested subject, or the configured default when absent or blank
    pub fn subject_or_default(&self, requested: Option<&str>) -> SubjectId {
        match requested.map(str::trim) {
            Some(id) if !id.is_empty() => SubjectId::new(id),
            _ => SubjectId::new(self.default_subject.as_str()),
        }
    }
}
