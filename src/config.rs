//! Configuration management for the EMI risk engine

use crate::types::prediction::{ConfidenceThresholds, OverallRiskThresholds, RiskLevelThresholds};
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub assessment: AssessmentConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Prefix for request subjects (`<prefix>.eligibility`, ...)
    pub subject_prefix: String,
}

/// Model artifact store configuration.
///
/// Every artifact is optional on disk; the file names only say where to look.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing the artifacts
    pub models_dir: String,
    #[serde(default = "default_classifier_file")]
    pub classifier_file: String,
    #[serde(default = "default_regressor_file")]
    pub regressor_file: String,
    #[serde(default = "default_classification_scaler_file")]
    pub classification_scaler_file: String,
    #[serde(default = "default_regression_scaler_file")]
    pub regression_scaler_file: String,
    #[serde(default = "default_label_decoder_file")]
    pub label_decoder_file: String,
    /// Offline evaluation results used as the baseline model accuracy
    #[serde(default = "default_evaluation_file")]
    pub evaluation_file: String,
    /// Number of threads for ONNX inference per model (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_classifier_file() -> String {
    "classification_model.onnx".to_string()
}

fn default_regressor_file() -> String {
    "regression_model.onnx".to_string()
}

fn default_classification_scaler_file() -> String {
    "scaler_classification.json".to_string()
}

fn default_regression_scaler_file() -> String {
    "scaler_regression.json".to_string()
}

fn default_label_decoder_file() -> String {
    "label_encoder.json".to_string()
}

fn default_evaluation_file() -> String {
    "evaluation_dashboard_data.json".to_string()
}

fn default_onnx_threads() -> usize {
    1
}

impl ModelsConfig {
    /// Resolve an artifact file name against the models directory.
    pub fn path_of(&self, file: &str) -> PathBuf {
        Path::new(&self.models_dir).join(file)
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            models_dir: "models".to_string(),
            classifier_file: default_classifier_file(),
            regressor_file: default_regressor_file(),
            classification_scaler_file: default_classification_scaler_file(),
            regression_scaler_file: default_regression_scaler_file(),
            label_decoder_file: default_label_decoder_file(),
            evaluation_file: default_evaluation_file(),
            onnx_threads: default_onnx_threads(),
        }
    }
}

/// Thresholds used to turn raw model outputs into business figures
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssessmentConfig {
    #[serde(default)]
    pub risk_levels: RiskLevelThresholds,
    #[serde(default)]
    pub confidence: ConfidenceThresholds,
    #[serde(default)]
    pub overall: OverallRiskThresholds,
}

/// Background metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between background ticks
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Seconds to wait after a failed tick
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    /// Trailing window for predictions-per-minute
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Capacity of the recent-activity log
    #[serde(default = "default_recent_capacity")]
    pub recent_capacity: usize,
    /// Sample CPU/memory from the host instead of simulating
    #[serde(default = "default_sample_host")]
    pub sample_host: bool,
    /// Baseline model accuracy, replaced by the evaluation file when present
    #[serde(default)]
    pub baseline: BaselineAccuracy,
}

fn default_interval_secs() -> u64 {
    5
}

fn default_backoff_secs() -> u64 {
    10
}

fn default_window_secs() -> u64 {
    60
}

fn default_recent_capacity() -> usize {
    50
}

fn default_sample_host() -> bool {
    true
}

impl MetricsConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window_secs as i64)
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            backoff_secs: default_backoff_secs(),
            window_secs: default_window_secs(),
            recent_capacity: default_recent_capacity(),
            sample_host: default_sample_host(),
            baseline: BaselineAccuracy::default(),
        }
    }
}

/// Baseline accuracy per model type
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, serde::Serialize)]
pub struct BaselineAccuracy {
    pub classification: f64,
    pub regression: f64,
}

impl Default for BaselineAccuracy {
    fn default() -> Self {
        Self {
            classification: 0.97,
            regression: 0.99,
        }
    }
}

/// External experiment-tracking telemetry
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// MLflow tracking server; telemetry is disabled when unset
    #[serde(default)]
    pub mlflow_tracking_uri: Option<String>,
    /// Per-request HTTP timeout in milliseconds
    #[serde(default = "default_telemetry_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_telemetry_timeout_ms() -> u64 {
    2000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            mlflow_tracking_uri: None,
            timeout_ms: default_telemetry_timeout_ms(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of requests handled concurrently
    pub workers: usize,
    /// Seconds between published dashboard snapshots
    pub snapshot_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                subject_prefix: "emi".to_string(),
            },
            models: ModelsConfig::default(),
            assessment: AssessmentConfig::default(),
            metrics: MetricsConfig::default(),
            telemetry: TelemetryConfig::default(),
            pipeline: PipelineConfig {
                workers: 8,
                snapshot_interval_secs: 5,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.metrics.interval(), Duration::from_secs(5));
        assert_eq!(config.metrics.backoff(), Duration::from_secs(10));
        assert_eq!(config.metrics.recent_capacity, 50);
        assert_eq!(config.metrics.baseline.classification, 0.97);
        assert!(config.telemetry.mlflow_tracking_uri.is_none());
        assert_eq!(config.assessment.risk_levels.high, 50.0);
    }

    #[test]
    fn test_load_minimal_file_fills_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[nats]
url = "nats://broker:4222"
subject_prefix = "loans"

[models]
models_dir = "/srv/models"

[pipeline]
workers = 2
snapshot_interval_secs = 10

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.nats.subject_prefix, "loans");
        assert_eq!(config.models.classifier_file, "classification_model.onnx");
        assert_eq!(
            config.models.path_of("label_encoder.json"),
            PathBuf::from("/srv/models/label_encoder.json")
        );
        assert_eq!(config.metrics.window_secs, 60);
        assert_eq!(config.assessment.confidence.high, 0.8);
    }
}
