//! Per-subject state registry
//!
//! Each subject owns a sequence assembler behind its own lock, so requests for
//! one subject are serialized while different subjects proceed in parallel.
//! The registry lock is only held to look up or insert an entry.

use crate::error::PipelineError;
use inference_engine::{SequenceAssembler, SubjectId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Mutable state of one subject
#[derive(Debug)]
pub struct SubjectState {
    pub assembler: SequenceAssembler,
    last_seen: Instant,
}

impl SubjectState {
    fn new(sequence_length: usize) -> Self {
        Self {
            assembler: SequenceAssembler::new(sequence_length),
            last_seen: Instant::now(),
        }
    }

    /// Mark the subject active
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }
}

pub struct SubjectRegistry {
    sequence_length: usize,
    subjects: Mutex<HashMap<SubjectId, Arc<Mutex<SubjectState>>>>,
}

impl SubjectRegistry {
    pub fn new(sequence_length: usize) -> Self {
        Self {
            sequence_length,
            subjects: Mutex::new(HashMap::new()),
        }
    }

    /// State of `subject`, created on first use
    pub fn get_or_create(&self, subject: &SubjectId) -> Result<Arc<Mutex<SubjectState>>, PipelineError> {
        let mut subjects = self
            .subjects
            .lock()
            .map_err(|e| PipelineError::StatePoisoned(e.to_string()))?;

        let state = subjects.entry(subject.clone()).or_insert_with(|| {
            info!("Creating state for subject {}", subject);
            Arc::new(Mutex::new(SubjectState::new(self.sequence_length)))
        });
        Ok(Arc::clone(state))
    }

    /// Drop subjects idle for longer than `timeout`. Returns how many were evicted.
    pub fn evict_idle(&self, timeout: Duration) -> usize {
        self.evict_idle_at(Instant::now(), timeout)
    }

    /// Eviction against an explicit clock. States currently held by a request
    /// are kept.
    pub fn evict_idle_at(&self, now: Instant, timeout: Duration) -> usize {
        let Ok(mut subjects) = self.subjects.lock() else {
            return 0;
        };

        let before = subjects.len();
        subjects.retain(|subject, state| {
            if Arc::strong_count(state) > 1 {
                return true;
            }
            let keep = match state.try_lock() {
                Ok(state) => now.saturating_duration_since(state.last_seen) <= timeout,
                Err(_) => true,
            };
            if !keep {
                debug!("Evicting idle subject {}", subject);
            }
            keep
        });

        let evicted = before - subjects.len();
        if evicted > 0 {
            info!("Evicted {} idle subjects", evicted);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.subjects.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
