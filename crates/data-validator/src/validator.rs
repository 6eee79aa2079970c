//! Payload Validator for Sensor Batches

use crate::error::ValidationError;
use crate::sample::{Sample, SampleBatch, Vector3};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Offset-aware layouts tried after RFC 3339
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%:z"];

/// Naive layouts, interpreted as UTC
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Maximum samples accepted in one batch
    pub max_batch_samples: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_batch_samples: 100_000,
        }
    }
}

/// Validator turning raw JSON payloads into chronological sample batches
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    /// Create a new validator with given config
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Parse a payload that is either a bare list of samples or a map of
    /// session id to sample list. All sessions are flattened into one batch.
    pub fn parse_batch(&self, payload: &Value) -> Result<SampleBatch, ValidationError> {
        let raw: Vec<&Value> = match payload {
            Value::Array(items) => items.iter().collect(),
            Value::Object(sessions) => Self::flatten_sessions(sessions)?,
            other => {
                return Err(ValidationError::InvalidFormat(format!(
                    "expected a list or a session map, got {}",
                    json_kind(other)
                )))
            }
        };

        if raw.len() > self.config.max_batch_samples {
            return Err(ValidationError::BatchTooLarge {
                actual: raw.len(),
                limit: self.config.max_batch_samples,
            });
        }

        let samples = raw
            .into_iter()
            .enumerate()
            .map(|(index, value)| Self::parse_sample(index, value))
            .collect::<Result<Vec<_>, _>>()?;

        let out_of_order = samples
            .windows(2)
            .any(|pair| pair[1].timestamp < pair[0].timestamp);
        if out_of_order {
            warn!("Sensor batch arrived out of order, sorting {} samples", samples.len());
        }

        let batch = SampleBatch::new(samples);
        debug!("Parsed sensor batch with {} samples", batch.len());
        Ok(batch)
    }

    fn flatten_sessions(sessions: &Map<String, Value>) -> Result<Vec<&Value>, ValidationError> {
        if sessions.is_empty() {
            return Err(ValidationError::InvalidFormat("empty session map".to_string()));
        }

        let mut raw = Vec::new();
        for (session, value) in sessions {
            match value {
                Value::Array(items) => raw.extend(items.iter()),
                other => {
                    return Err(ValidationError::InvalidFormat(format!(
                        "session '{}' holds {}, expected a list",
                        session,
                        json_kind(other)
                    )))
                }
            }
        }
        Ok(raw)
    }

    /// Parse one sample; sensor components that are missing or non-numeric become NaN
    fn parse_sample(index: usize, value: &Value) -> Result<Sample, ValidationError> {
        let object = value.as_object().ok_or_else(|| {
            ValidationError::InvalidFormat(format!("sample {} is {}, expected an object", index, json_kind(value)))
        })?;

        let raw_timestamp = match object.get("timestamp") {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => {
                return Err(ValidationError::MissingField {
                    index,
                    field: "timestamp",
                })
            }
            Some(other) => {
                return Err(ValidationError::InvalidTimestamp {
                    index,
                    value: other.to_string(),
                })
            }
        };

        let timestamp = parse_timestamp(raw_timestamp).ok_or_else(|| ValidationError::InvalidTimestamp {
            index,
            value: raw_timestamp.clone(),
        })?;

        Ok(Sample {
            timestamp,
            acceleration: parse_vector(object.get("acceleration")),
            rotation: parse_vector(object.get("rotation")),
        })
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

/// Parse an ISO-8601 timestamp. Whitespace following a ':' is dropped first,
/// since some devices emit "10: 02: 03". Naive timestamps are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let cleaned = strip_colon_whitespace(raw.trim());

    if let Ok(ts) = DateTime::parse_from_rfc3339(&cleaned) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(&cleaned, format) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(&cleaned, format) {
            return Some(ts.and_utc());
        }
    }
    None
}

fn strip_colon_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut after_colon = false;
    for c in raw.chars() {
        if after_colon && c.is_whitespace() {
            continue;
        }
        after_colon = c == ':';
        out.push(c);
    }
    out
}

fn parse_vector(value: Option<&Value>) -> Vector3 {
    match value {
        Some(Value::Object(fields)) => Vector3::new(
            parse_component(fields.get("x")),
            parse_component(fields.get("y")),
            parse_component(fields.get("z")),
        ),
        _ => Vector3::MISSING,
    }
}

fn parse_component(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
