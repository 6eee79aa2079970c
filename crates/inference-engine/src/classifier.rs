//! Activity Classifier Implementation

use crate::activity::ActivityType;
use crate::sequencer::Sequence;
use crate::InferenceError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};
use tract_onnx::prelude::*;

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Classifier output for one sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Detected activity (argmax + 1)
    pub activity: ActivityType,
    /// Probability of the detected activity
    pub confidence: f64,
    /// Probabilities for each class
    pub probabilities: Vec<f64>,
}

impl Classification {
    /// Pick the most likely class from a model output vector
    pub fn from_probabilities(probabilities: Vec<f64>) -> Result<Self, InferenceError> {
        if probabilities.len() != ActivityType::COUNT {
            return Err(InferenceError::InvalidOutput(format!(
                "expected {} class probabilities, got {}",
                ActivityType::COUNT,
                probabilities.len()
            )));
        }
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(InferenceError::InvalidOutput(
                "non-finite class probability".to_string(),
            ));
        }

        // First maximum wins on ties
        let (index, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, p)| if p > best.1 { (i, p) } else { best });

        let activity = ActivityType::from_class_index(index).ok_or_else(|| {
            InferenceError::InvalidOutput(format!("class index {} has no label", index))
        })?;

        Ok(Self {
            activity,
            confidence,
            probabilities,
        })
    }
}

/// Black-box model mapping a sequence to an activity
pub trait ActivityClassifier: Send + Sync {
    /// Expected `(sequence_length, feature_count)` of the input
    fn input_shape(&self) -> (usize, usize);

    /// Classify one sequence
    fn classify(&self, sequence: &Sequence) -> Result<Classification, InferenceError>;
}

fn check_shape(sequence: &Sequence, expected: (usize, usize)) -> Result<(), InferenceError> {
    let widths_match = sequence.steps().iter().all(|s| s.values.len() == expected.1);
    if sequence.len() != expected.0 || !widths_match {
        return Err(InferenceError::InvalidInputShape {
            expected: format!("[1, {}, {}]", expected.0, expected.1),
            actual: format!("[1, {}, {}]", sequence.len(), sequence.feature_count()),
        });
    }
    Ok(())
}

/// ONNX classifier executed with tract
pub struct OnnxClassifier {
    /// Optimized runnable plan
    plan: OnnxPlan,
    sequence_length: usize,
    feature_count: usize,
}

impl OnnxClassifier {
    /// Load and optimize a model taking `[1, sequence_length, feature_count]` f32 input
    pub fn load(model_path: &str, sequence_length: usize, feature_count: usize) -> Result<Self, InferenceError> {
        info!(
            "Loading activity model {} with input [1, {}, {}]",
            model_path, sequence_length, feature_count
        );

        let load_error = |e: TractError| InferenceError::ModelLoadError(format!("{}: {}", model_path, e));

        let plan = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(load_error)?
            .with_input_fact(0, f32::fact([1, sequence_length, feature_count]).into())
            .map_err(load_error)?
            .into_optimized()
            .map_err(load_error)?
            .into_runnable()
            .map_err(load_error)?;

        info!("Model loaded successfully");

        Ok(Self {
            plan,
            sequence_length,
            feature_count,
        })
    }
}

impl ActivityClassifier for OnnxClassifier {
    fn input_shape(&self) -> (usize, usize) {
        (self.sequence_length, self.feature_count)
    }

    fn classify(&self, sequence: &Sequence) -> Result<Classification, InferenceError> {
        check_shape(sequence, self.input_shape())?;

        let input: Tensor = tract_ndarray::Array3::from_shape_vec(
            (1, self.sequence_length, self.feature_count),
            sequence.to_f32(),
        )
        .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?
        .into();

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let output = outputs
            .first()
            .ok_or_else(|| InferenceError::InvalidOutput("model produced no outputs".to_string()))?;
        let probabilities: Vec<f64> = output
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::InvalidOutput(e.to_string()))?
            .iter()
            .map(|p| *p as f64)
            .collect();

        let classification = Classification::from_probabilities(probabilities)?;
        debug!(
            "Classified sequence as {} (conf={:.2})",
            classification.activity, classification.confidence
        );
        Ok(classification)
    }
}

/// Mock classifier for development and tests: cycles through a fixed script
pub struct MockClassifier {
    script: Vec<ActivityType>,
    cursor: AtomicUsize,
    sequence_length: usize,
    feature_count: usize,
}

impl MockClassifier {
    /// Always report the same activity
    pub fn constant(activity: ActivityType, sequence_length: usize, feature_count: usize) -> Self {
        Self::scripted(vec![activity], sequence_length, feature_count)
    }

    /// Report activities in order, wrapping around at the end
    pub fn scripted(script: Vec<ActivityType>, sequence_length: usize, feature_count: usize) -> Self {
        info!("Creating mock classifier with {} scripted labels", script.len());
        let script = if script.is_empty() {
            vec![ActivityType::Sit]
        } else {
            script
        };
        Self {
            script,
            cursor: AtomicUsize::new(0),
            sequence_length,
            feature_count,
        }
    }
}

impl ActivityClassifier for MockClassifier {
    fn input_shape(&self) -> (usize, usize) {
        (self.sequence_length, self.feature_count)
    }

    fn classify(&self, sequence: &Sequence) -> Result<Classification, InferenceError> {
        check_shape(sequence, self.input_shape())?;

        let position = self.cursor.fetch_add(1, Ordering::Relaxed) % self.script.len();
        let activity = self.script[position];

        let mut probabilities = vec![0.0; ActivityType::COUNT];
        probabilities[activity.code() as usize - 1] = 1.0;
        Classification::from_probabilities(probabilities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use feature_engine::{FeatureVector, WindowSpan};

    fn sequence(len: usize, width: usize) -> Sequence {
        let at = Utc.timestamp_opt(0, 0).unwrap();
        Sequence::new(
            (0..len)
                .map(|i| FeatureVector {
                    values: vec![0.0; width],
                    window_index: i,
                    span: WindowSpan { start: at, end: at },
                })
                .collect(),
        )
    }

    #[test]
    fn test_argmax_plus_one() {
        let c = Classification::from_probabilities(vec![0.05, 0.1, 0.6, 0.05, 0.05, 0.05, 0.05, 0.05]).unwrap();
        assert_eq!(c.activity, ActivityType::Stand);
        assert!((c.confidence - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_wrong_output_length() {
        assert!(matches!(
            Classification::from_probabilities(vec![0.5, 0.5]),
            Err(InferenceError::InvalidOutput(_))
        ));
    }

    #[test]
    fn test_mock_script_cycles() {
        let classifier = MockClassifier::scripted(vec![ActivityType::Walk, ActivityType::Fall], 3, 4);
        let seq = sequence(3, 4);
        let labels: Vec<_> = (0..3)
            .map(|_| classifier.classify(&seq).unwrap().activity)
            .collect();
        assert_eq!(labels, vec![ActivityType::Walk, ActivityType::Fall, ActivityType::Walk]);
    }

    #[test]
    fn test_shape_mismatch_surfaces() {
        let classifier = MockClassifier::constant(ActivityType::Sit, 3, 72);
        let err = classifier.classify(&sequence(2, 72)).unwrap_err();
        assert!(matches!(err, InferenceError::InvalidInputShape { .. }));

        let err = classifier.classify(&sequence(3, 71)).unwrap_err();
        assert!(err.to_string().contains("[1, 3, 72]"));
    }

    #[test]
    fn test_missing_model_file() {
        let result = OnnxClassifier::load("/nonexistent/model.onnx", 3, 72);
        assert!(matches!(result, Err(InferenceError::ModelLoadError(_))));
    }
}
