//! Service configuration
//!
//! Layers compiled defaults, an optional `activity-service.toml` in the
//! working directory and `ACTIVITY__*` environment variables, e.g.
//! `ACTIVITY__SERVER__BIND=0.0.0.0:8080` or `ACTIVITY__PIPELINE__SEQUENCE_LENGTH=3`.

use crate::rate_limit::RateLimitConfig;
use activity_pipeline::PipelineConfig;
use alerting::AlertConfig;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Base name of the optional configuration file
pub const CONFIG_FILE: &str = "activity-service";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "ACTIVITY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    /// Limits on the device-token and location endpoints
    pub rate_limit: RateLimitConfig,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5050".to_string(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Trained artifacts. Without them the service runs with an identity scaler
/// and a mock classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// JSON scaler parameters
    pub scaler_path: Option<String>,
    /// ONNX classifier
    pub model_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Repository snapshot restored at startup and written at shutdown
    pub snapshot_path: Option<String>,
    /// Day documents older than this many days are dropped
    pub retention_days: i64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when RUST_LOG is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub pipeline: PipelineConfig,
    pub alerting: AlertConfig,
    pub models: ModelSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load from the optional config file and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()
    }

    /// Load from TOML text only
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activity_pipeline::TimestampMode;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.bind, "0.0.0.0:5050");
        assert_eq!(settings.pipeline.window_size, 50);
        assert_eq!(settings.alerting.gap_tolerance_secs, 20);
        assert!(settings.models.model_path.is_none());
        assert_eq!(settings.storage.retention_days, 30);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            [pipeline]
            sequence_length = 4
            timestamp_mode = "per_window"

            [alerting.thresholds]
            sit_min_minutes = 90

            [models]
            model_path = "model/activity.onnx"
            "#,
        )
        .unwrap();

        assert_eq!(settings.pipeline.sequence_length, 4);
        assert_eq!(settings.pipeline.timestamp_mode, TimestampMode::PerWindow);
        assert_eq!(settings.pipeline.overlap, 0.5);
        assert_eq!(settings.alerting.thresholds.sit_min_minutes, 90);
        assert_eq!(settings.alerting.thresholds.stand_min_minutes, 30);
        assert_eq!(settings.models.model_path.as_deref(), Some("model/activity.onnx"));
        assert_eq!(settings.server, ServerSettings::default());
    }
}
