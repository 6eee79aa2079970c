//! Overlapping window segmentation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Window geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Samples per window (default: 50)
    pub window_size: usize,
    /// Fraction of a window reused by the next one, in [0, 1) (default: 0.5)
    pub overlap: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_size: 50,
            overlap: 0.5,
        }
    }
}

impl WindowConfig {
    pub fn new(window_size: usize, overlap: f64) -> Self {
        Self {
            window_size,
            overlap,
        }
    }

    /// Offset between window starts: `floor(window_size * (1 - overlap))`.
    /// Zero for degenerate geometry, which yields no windows.
    pub fn step(&self) -> usize {
        if !(0.0..1.0).contains(&self.overlap) {
            return 0;
        }
        (self.window_size as f64 * (1.0 - self.overlap)).floor() as usize
    }

    /// Whether this geometry can produce windows at all
    pub fn is_valid(&self) -> bool {
        self.window_size > 0 && self.step() > 0
    }
}

/// Time range covered by a window (first and last sample timestamps)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Slice `data` into windows `data[i..i + W]` for `i = 0, step, 2 * step, ...`
/// while `i + W <= len`. Empty when the data is shorter than one window or the
/// step is zero.
pub fn create_windows<'a, T>(data: &'a [T], config: &WindowConfig) -> Vec<&'a [T]> {
    let size = config.window_size;
    let step = config.step();
    if size == 0 || step == 0 || data.len() < size {
        return Vec::new();
    }

    (0..=data.len() - size)
        .step_by(step)
        .map(|start| &data[start..start + size])
        .collect()
}

/// Number of windows `create_windows` yields for `len` samples
pub fn window_count(len: usize, config: &WindowConfig) -> usize {
    let step = config.step();
    if config.window_size == 0 || step == 0 || len < config.window_size {
        0
    } else {
        (len - config.window_size) / step + 1
    }
}

/// First and last timestamp of the whole batch. Every window of the batch is
/// labelled with this same span.
pub fn batch_span(timestamps: &[DateTime<Utc>]) -> Option<WindowSpan> {
    match (timestamps.first(), timestamps.last()) {
        (Some(start), Some(end)) => Some(WindowSpan {
            start: *start,
            end: *end,
        }),
        _ => None,
    }
}

/// Span of each window, aligned with `create_windows` over the same data
pub fn window_spans(timestamps: &[DateTime<Utc>], config: &WindowConfig) -> Vec<WindowSpan> {
    create_windows(timestamps, config)
        .into_iter()
        .filter_map(batch_span)
        .collect()
}
