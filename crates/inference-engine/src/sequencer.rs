//! Sequence Assembler
//!
//! Bridges independently extracted window features into the overlapping
//! fixed-length sequences a recurrent classifier expects. The history lives
//! across ingestion calls, so windows from consecutive requests of the same
//! subject still form contiguous sequences.

use feature_engine::{FeatureVector, WindowSpan};
use ring_buffer::RingBuffer;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default number of windows per sequence
pub const DEFAULT_SEQUENCE_LENGTH: usize = 3;

/// Consecutive normalized feature vectors in time order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    steps: Vec<FeatureVector>,
}

impl Sequence {
    pub fn new(steps: Vec<FeatureVector>) -> Self {
        Self { steps }
    }

    /// Number of windows in the sequence
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[FeatureVector] {
        &self.steps
    }

    /// Width of the first step (0 for an empty sequence)
    pub fn feature_count(&self) -> usize {
        self.steps.first().map_or(0, |s| s.values.len())
    }

    /// Span of the most recent window
    pub fn newest_span(&self) -> Option<WindowSpan> {
        self.steps.last().map(|s| s.span)
    }

    /// Row-major `[len, feature_count]` values as f32 for model input
    pub fn to_f32(&self) -> Vec<f32> {
        self.steps
            .iter()
            .flat_map(|s| s.values.iter().map(|v| *v as f32))
            .collect()
    }
}

/// Per-subject sequence assembler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceAssembler {
    sequence_length: usize,
    /// Most recent normalized vectors, never longer than `sequence_length`
    history: RingBuffer<FeatureVector>,
    /// Sequences completed since the last drain
    pending: Vec<Sequence>,
}

impl SequenceAssembler {
    /// Create an assembler emitting sequences of `sequence_length` windows
    pub fn new(sequence_length: usize) -> Self {
        let sequence_length = sequence_length.max(1);
        Self {
            sequence_length,
            history: RingBuffer::new(sequence_length),
            pending: Vec::new(),
        }
    }

    /// Append a normalized vector, evicting the oldest beyond capacity
    pub fn ingest(&mut self, vector: FeatureVector) {
        self.history.push(vector);
        if self.history.is_full() {
            self.pending.push(Sequence::new(self.history.to_vec()));
        }
    }

    /// Take every contiguous `sequence_length` window completed since the
    /// previous drain, oldest first. Empty while the history is still short.
    pub fn drain(&mut self) -> Vec<Sequence> {
        let sequences = std::mem::take(&mut self.pending);
        if sequences.is_empty() {
            debug!(
                "Sequence history at {}/{}, waiting for more windows",
                self.history.len(),
                self.sequence_length
            );
        }
        sequences
    }

    /// Put drained sequences back ahead of any completed since, so the next
    /// drain returns them first
    pub fn requeue(&mut self, mut sequences: Vec<Sequence>) {
        if sequences.is_empty() {
            return;
        }
        debug!("Requeueing {} unclassified sequences", sequences.len());
        sequences.append(&mut self.pending);
        self.pending = sequences;
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// Vectors currently held in the history
    pub fn buffered(&self) -> usize {
        self.history.len()
    }
}

impl Default for SequenceAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_SEQUENCE_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn vector(tag: f64) -> FeatureVector {
        let at = Utc.timestamp_opt(tag as i64, 0).unwrap();
        FeatureVector {
            values: vec![tag; 4],
            window_index: tag as usize,
            span: WindowSpan { start: at, end: at },
        }
    }

    fn tags(sequence: &Sequence) -> Vec<f64> {
        sequence.steps().iter().map(|s| s.values[0]).collect()
    }

    #[test]
    fn test_exact_length_yields_one_sequence() {
        let mut assembler = SequenceAssembler::new(3);
        for tag in [1.0, 2.0, 3.0] {
            assembler.ingest(vector(tag));
        }

        let sequences = assembler.drain();
        assert_eq!(sequences.len(), 1);
        assert_eq!(tags(&sequences[0]), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_one_extra_yields_two_overlapping() {
        let mut assembler = SequenceAssembler::new(3);
        for tag in [1.0, 2.0, 3.0, 4.0] {
            assembler.ingest(vector(tag));
        }

        let sequences = assembler.drain();
        assert_eq!(sequences.len(), 2);
        assert_eq!(tags(&sequences[0]), vec![1.0, 2.0, 3.0]);
        assert_eq!(tags(&sequences[1]), vec![2.0, 3.0, 4.0]);
        assert_eq!(assembler.buffered(), 3);
    }

    #[test]
    fn test_short_history_is_not_an_error() {
        let mut assembler = SequenceAssembler::default();
        assembler.ingest(vector(1.0));
        assembler.ingest(vector(2.0));
        assert!(assembler.drain().is_empty());
    }

    #[test]
    fn test_history_spans_calls() {
        let mut assembler = SequenceAssembler::new(3);
        assembler.ingest(vector(1.0));
        assembler.ingest(vector(2.0));
        assert!(assembler.drain().is_empty());

        // Next request completes the sequence using the earlier windows
        assembler.ingest(vector(3.0));
        let sequences = assembler.drain();
        assert_eq!(sequences.len(), 1);
        assert_eq!(tags(&sequences[0]), vec![1.0, 2.0, 3.0]);

        // Drained sequences are not emitted twice
        assert!(assembler.drain().is_empty());

        assembler.ingest(vector(4.0));
        let sequences = assembler.drain();
        assert_eq!(tags(&sequences[0]), vec![2.0, 3.0, 4.0]);
        assert_eq!(sequences[0].newest_span().unwrap().start.timestamp(), 4);
    }

    #[test]
    fn test_requeued_sequences_come_first() {
        let mut assembler = SequenceAssembler::new(2);
        for tag in [1.0, 2.0, 3.0] {
            assembler.ingest(vector(tag));
        }
        let drained = assembler.drain();
        assert_eq!(drained.len(), 2);

        assembler.ingest(vector(4.0));
        assembler.requeue(drained);
        let tags: Vec<_> = assembler.drain().iter().map(tags).collect();
        assert_eq!(tags, vec![vec![1.0, 2.0], vec![2.0, 3.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn test_flattened_input() {
        let sequence = Sequence::new(vec![vector(1.0), vector(2.0)]);
        assert_eq!(sequence.feature_count(), 4);
        assert_eq!(sequence.to_f32(), vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0]);
    }

    proptest! {
        #[test]
        fn prop_history_bounded_and_sequences_counted(len in 1usize..6, count in 0usize..40) {
            let mut assembler = SequenceAssembler::new(len);
            for i in 0..count {
                assembler.ingest(vector(i as f64));
                prop_assert!(assembler.buffered() <= len);
            }
            let sequences = assembler.drain();
            prop_assert_eq!(sequences.len(), (count + 1).saturating_sub(len));
            for (offset, sequence) in sequences.iter().enumerate() {
                let expected: Vec<f64> = (offset..offset + len).map(|i| i as f64).collect();
                prop_assert_eq!(tags(sequence), expected);
            }
        }
    }
}
