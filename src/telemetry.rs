//! Optional external experiment-tracking telemetry.
//!
//! Telemetry only decorates the dashboard. A source that is down, slow or
//! absent never affects predictions or statistics.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Figures reported by a telemetry source; any of them may be missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMetrics {
    pub classification_accuracy: Option<f64>,
    pub regression_r2: Option<f64>,
    pub total_predictions: Option<u64>,
    pub avg_response_time: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

impl TelemetryMetrics {
    pub fn empty(last_updated: DateTime<Utc>) -> Self {
        Self {
            classification_accuracy: None,
            regression_r2: None,
            total_predictions: None,
            avg_response_time: None,
            last_updated,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.classification_accuracy.is_some()
            && self.regression_r2.is_some()
            && self.total_predictions.is_some()
            && self.avg_response_time.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.classification_accuracy.is_none()
            && self.regression_r2.is_none()
            && self.total_predictions.is_none()
            && self.avg_response_time.is_none()
    }
}

#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Query the source. `Ok(None)` means it answered with nothing usable.
    async fn fetch(&self) -> Result<Option<TelemetryMetrics>>;
}

/// Used when no telemetry backend is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

#[async_trait]
impl TelemetrySource for NoopTelemetry {
    async fn fetch(&self) -> Result<Option<TelemetryMetrics>> {
        Ok(None)
    }
}

/// MLflow tracking server, read through its REST API
pub struct MlflowTelemetry {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExperimentsResponse {
    #[serde(default)]
    experiments: Vec<Experiment>,
}

#[derive(Debug, Deserialize)]
struct Experiment {
    experiment_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct RunsResponse {
    #[serde(default)]
    runs: Vec<Run>,
}

#[derive(Debug, Default, Deserialize)]
struct Run {
    #[serde(default)]
    data: RunData,
}

#[derive(Debug, Default, Deserialize)]
struct RunData {
    #[serde(default)]
    metrics: Vec<Metric>,
}

#[derive(Debug, Deserialize)]
struct Metric {
    key: String,
    value: f64,
}

impl MlflowTelemetry {
    pub fn new(tracking_uri: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build telemetry HTTP client")?;

        Ok(Self {
            client,
            base_url: tracking_uri.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}/api/2.0/mlflow/{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("MLflow request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("MLflow returned an error for {}", url))?;

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode MLflow response from {}", url))
    }
}

#[async_trait]
impl TelemetrySource for MlflowTelemetry {
    async fn fetch(&self) -> Result<Option<TelemetryMetrics>> {
        let experiments: ExperimentsResponse = self
            .post("experiments/search", json!({ "max_results": 100 }))
            .await?;

        let mut metrics = TelemetryMetrics::empty(Utc::now());

        for experiment in &experiments.experiments {
            let runs: RunsResponse = match self
                .post(
                    "runs/search",
                    json!({
                        "experiment_ids": [experiment.experiment_id],
                        "max_results": 5,
                        "order_by": ["attributes.start_time DESC"],
                    }),
                )
                .await
            {
                Ok(runs) => runs,
                Err(e) => {
                    debug!(experiment = %experiment.experiment_id, error = %e, "Skipping experiment");
                    continue;
                }
            };

            if absorb_runs(&mut metrics, &runs.runs) {
                break;
            }
        }

        Ok(if metrics.is_empty() { None } else { Some(metrics) })
    }
}

/// Fill missing fields from run metrics, first value wins. Returns true once
/// every field is known.
fn absorb_runs(metrics: &mut TelemetryMetrics, runs: &[Run]) -> bool {
    for run in runs {
        for metric in &run.data.metrics {
            if !metric.value.is_finite() {
                continue;
            }
            match metric.key.as_str() {
                "accuracy" if metrics.classification_accuracy.is_none() => {
                    metrics.classification_accuracy = Some(metric.value);
                }
                "r2" | "r2_score" if metrics.regression_r2.is_none() => {
                    metrics.regression_r2 = Some(metric.value);
                }
                "predictions" if metrics.total_predictions.is_none() && metric.value >= 0.0 => {
                    metrics.total_predictions = Some(metric.value as u64);
                }
                "avg_response_time" if metrics.avg_response_time.is_none() => {
                    metrics.avg_response_time = Some(metric.value);
                }
                _ => {}
            }
        }

        if metrics.is_complete() {
            return true;
        }
    }
    metrics.is_complete()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs(json: &str) -> Vec<Run> {
        serde_json::from_str::<RunsResponse>(json).unwrap().runs
    }

    #[test]
    fn test_absorb_first_value_wins() {
        let mut metrics = TelemetryMetrics::empty(Utc::now());
        let batch = runs(
            r#"{"runs": [
                {"data": {"metrics": [{"key": "accuracy", "value": 0.95, "step": 0},
                                      {"key": "r2_score", "value": 0.91}]}},
                {"data": {"metrics": [{"key": "accuracy", "value": 0.5},
                                      {"key": "predictions", "value": 1200.0}]}}
            ]}"#,
        );

        let complete = absorb_runs(&mut metrics, &batch);
        assert!(!complete);
        assert_eq!(metrics.classification_accuracy, Some(0.95));
        assert_eq!(metrics.regression_r2, Some(0.91));
        assert_eq!(metrics.total_predictions, Some(1200));
        assert_eq!(metrics.avg_response_time, None);
    }

    #[test]
    fn test_absorb_stops_when_complete() {
        let mut metrics = TelemetryMetrics::empty(Utc::now());
        let batch = runs(
            r#"{"runs": [
                {"data": {"metrics": [{"key": "accuracy", "value": 0.9},
                                      {"key": "r2", "value": 0.8},
                                      {"key": "predictions", "value": 10},
                                      {"key": "avg_response_time", "value": 0.02}]}}
            ]}"#,
        );
        assert!(absorb_runs(&mut metrics, &batch));
        assert!(metrics.is_complete());
    }

    #[test]
    fn test_runs_without_data_parse() {
        let batch = runs(r#"{"runs": [{"info": {"run_id": "abc"}}]}"#);
        let mut metrics = TelemetryMetrics::empty(Utc::now());
        assert!(!absorb_runs(&mut metrics, &batch));
        assert!(metrics.is_empty());
        assert!(runs("{}").is_empty());
    }

    #[tokio::test]
    async fn test_noop_reports_nothing() {
        assert!(NoopTelemetry.fetch().await.unwrap().is_none());
    }
}
