//! Ingestion Pipeline

use crate::config::{PipelineConfig, TimestampMode};
use crate::error::PipelineError;
use crate::subject::SubjectRegistry;
use alerting::ActivityEvent;
use chrono::NaiveDate;
use data_validator::{FeatureNormalizer, ValidationConfig, Validator};
use feature_engine::{FeatureExtractor, FeatureVector, FEATURE_DIMENSION};
use inference_engine::{ActivityClassifier, ActivityRecord, ActivityType, InferenceError, SubjectId};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use storage::Repository;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Result of one ingestion call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestOutcome {
    /// One record per classified sequence, oldest first
    pub records: Vec<ActivityRecord>,
    /// Windows extracted from the batch
    pub windows: usize,
    /// Whether any record is a fall
    pub fall_detected: bool,
}

pub struct ActivityPipeline {
    config: PipelineConfig,
    validator: Validator,
    extractor: FeatureExtractor,
    normalizer: Arc<dyn FeatureNormalizer>,
    classifier: Arc<dyn ActivityClassifier>,
    subjects: SubjectRegistry,
    repository: Option<Arc<Repository>>,
    events: Option<mpsc::Sender<ActivityEvent>>,
}

impl ActivityPipeline {
    /// Build a pipeline, failing fast when the scaler or the classifier does
    /// not match the feature layout and sequence length.
    pub fn new(
        config: PipelineConfig,
        normalizer: Arc<dyn FeatureNormalizer>,
        classifier: Arc<dyn ActivityClassifier>,
    ) -> Result<Self, PipelineError> {
        let window = config.window();
        let extractor = FeatureExtractor::new(window)
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;

        if config.sequence_length == 0 {
            return Err(PipelineError::InvalidConfig("sequence_length must be at least 1".to_string()));
        }

        if normalizer.feature_count() != FEATURE_DIMENSION {
            return Err(PipelineError::ModelContract(format!(
                "scaler expects {} features, extractor produces {}",
                normalizer.feature_count(),
                FEATURE_DIMENSION
            )));
        }

        let expected_shape = (config.sequence_length, FEATURE_DIMENSION);
        if classifier.input_shape() != expected_shape {
            return Err(PipelineError::ModelContract(format!(
                "classifier input {:?} differs from {:?}",
                classifier.input_shape(),
                expected_shape
            )));
        }

        info!(
            "Activity pipeline ready: window {} step {}, sequences of {}, {:?} timestamps",
            window.window_size,
            window.step(),
            config.sequence_length,
            config.timestamp_mode
        );

        Ok(Self {
            validator: Validator::new(ValidationConfig {
                max_batch_samples: config.max_batch_samples,
            }),
            extractor,
            normalizer,
            classifier,
            subjects: SubjectRegistry::new(config.sequence_length),
            repository: None,
            events: None,
            config,
        })
    }

    /// Persist records and fall status to `repository`
    pub fn with_repository(mut self, repository: Arc<Repository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Publish classified records on `events`. Publishing waits for room in
    /// the channel, so `ingest` must run off the async executor (for example
    /// under `spawn_blocking`).
    pub fn with_events(mut self, events: mpsc::Sender<ActivityEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn subjects(&self) -> &SubjectRegistry {
        &self.subjects
    }

    /// Drop subject state idle beyond the configured timeout
    pub fn evict_idle(&self) -> usize {
        self.subjects.evict_idle(self.config.idle_timeout())
    }

    /// Turn one raw batch into activity records for `subject`. Too little
    /// data for a window or a full sequence is not an error and yields no
    /// records.
    pub fn ingest(&self, subject: &SubjectId, payload: &Value) -> Result<IngestOutcome, PipelineError> {
        let result = self.run(subject, payload);
        if let Err(e) = &result {
            warn!("Ingestion for {} failed: {}", subject, e);
            metrics::counter!("activity_ingest_errors_total", "kind" => e.kind()).increment(1);
        }
        result
    }

    fn run(&self, subject: &SubjectId, payload: &Value) -> Result<IngestOutcome, PipelineError> {
        let batch = self.validator.parse_batch(payload)?;
        let vectors = self.normalize(self.extractor.extract_batch(&batch)?)?;
        let windows = vectors.len();
        metrics::counter!("activity_windows_total").increment(windows as u64);

        let bounds = batch.bounds();
        let records = {
            let state = self.subjects.get_or_create(subject)?;
            let mut state = state
                .lock()
                .map_err(|e| PipelineError::StatePoisoned(e.to_string()))?;
            state.touch();

            for vector in vectors {
                state.assembler.ingest(vector);
            }

            let sequences = state.assembler.drain();
            let classified: Result<Vec<_>, InferenceError> = sequences
                .iter()
                .map(|sequence| {
                    let started = Instant::now();
                    let classification = self.classifier.classify(sequence)?;
                    metrics::histogram!("activity_classify_latency_ms")
                        .record(started.elapsed().as_secs_f64() * 1000.0);
                    Ok::<_, InferenceError>(classification)
                })
                .collect();
            let classifications = match classified {
                Ok(classifications) => classifications,
                Err(e) => {
                    // Nothing from this batch is committed; the next call retries it
                    state.assembler.requeue(sequences);
                    return Err(PipelineError::Classification(e));
                }
            };

            let mut records = Vec::with_capacity(sequences.len());
            for (sequence, classification) in sequences.iter().zip(classifications) {
                let window_span = sequence.newest_span().map(|s| (s.start, s.end));
                let span = match self.config.timestamp_mode {
                    TimestampMode::BatchBounds => bounds.or(window_span),
                    TimestampMode::PerWindow => window_span.or(bounds),
                };
                match span {
                    Some((start, end)) => records.push(ActivityRecord::new(classification.activity, start, end)),
                    None => warn!("Sequence for {} has no time range, dropping", subject),
                }
            }
            records
        };

        let fall_detected = records.iter().any(|r| r.activity == ActivityType::Fall);
        metrics::counter!("activity_records_total").increment(records.len() as u64);
        debug!(
            "Subject {}: {} samples, {} windows, {} records",
            subject,
            batch.len(),
            windows,
            records.len()
        );

        self.persist(subject, &records, fall_detected)?;
        self.publish(subject, &records);

        Ok(IngestOutcome {
            records,
            windows,
            fall_detected,
        })
    }

    /// Replace raw feature values with scaled ones
    fn normalize(&self, vectors: Vec<FeatureVector>) -> Result<Vec<FeatureVector>, PipelineError> {
        if vectors.is_empty() {
            return Ok(vectors);
        }
        let rows: Vec<Vec<f64>> = vectors.iter().map(|v| v.values.clone()).collect();
        let scaled = self.normalizer.transform(&rows)?;
        Ok(vectors
            .into_iter()
            .zip(scaled)
            .map(|(vector, values)| FeatureVector { values, ..vector })
            .collect())
    }

    /// Append records to their day documents and refresh the fall flag
    fn persist(&self, subject: &SubjectId, records: &[ActivityRecord], fall_detected: bool) -> Result<(), PipelineError> {
        let Some(repository) = &self.repository else {
            return Ok(());
        };

        let mut by_day: BTreeMap<NaiveDate, Vec<ActivityRecord>> = BTreeMap::new();
        for record in records {
            by_day
                .entry(record.start_time.date_naive())
                .or_default()
                .push(record.clone());
        }
        for (date, day_records) in by_day {
            repository.append_records(subject, date, &day_records)?;
        }

        repository.set_fall(subject, fall_detected)?;
        Ok(())
    }

    fn publish(&self, subject: &SubjectId, records: &[ActivityRecord]) {
        let Some(events) = &self.events else {
            return;
        };
        if records.is_empty() {
            return;
        }

        let event = ActivityEvent::RecordsClassified {
            subject: subject.clone(),
            records: records.to_vec(),
        };
        if events.blocking_send(event).is_err() {
            warn!("Sweep stopped, {} records for {} not forwarded", records.len(), subject);
        }
    }
}
