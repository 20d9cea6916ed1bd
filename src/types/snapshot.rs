//! Read-only views of engine state served to the dashboard

use crate::config::BaselineAccuracy;
use crate::metrics::updater::UpdaterState;
use crate::telemetry::TelemetryMetrics;
use crate::types::prediction::PredictionResult;
use crate::types::profile::CustomerProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Running prediction counters.
///
/// `successful_predictions + failed_predictions == total_predictions` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningStatistics {
    pub total_predictions: u64,
    pub successful_predictions: u64,
    pub failed_predictions: u64,
    /// Incremental mean of call latency, seconds
    pub avg_prediction_time: f64,
    pub model_accuracy: BaselineAccuracy,
}

impl RunningStatistics {
    pub fn new(model_accuracy: BaselineAccuracy) -> Self {
        Self {
            total_predictions: 0,
            successful_predictions: 0,
            failed_predictions: 0,
            avg_prediction_time: 0.0,
            model_accuracy,
        }
    }

    /// Fraction of successful calls, 0 when nothing was recorded
    pub fn success_rate(&self) -> f64 {
        if self.total_predictions == 0 {
            0.0
        } else {
            self.successful_predictions as f64 / self.total_predictions as f64
        }
    }
}

/// One entry of the recent-activity log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub result: PredictionResult,
    pub input: CustomerProfile,
    pub timestamp: DateTime<Utc>,
}

/// Health bucket derived from the success rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemHealth {
    Excellent,
    Good,
    #[serde(rename = "Needs Attention")]
    NeedsAttention,
}

impl SystemHealth {
    pub fn from_success_rate(success_rate: f64) -> Self {
        if success_rate > 0.95 {
            SystemHealth::Excellent
        } else if success_rate > 0.8 {
            SystemHealth::Good
        } else {
            SystemHealth::NeedsAttention
        }
    }
}

/// Consistent point-in-time read of the statistics aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub statistics: RunningStatistics,
    /// Oldest first
    pub recent_predictions: Vec<ActivityEntry>,
    pub success_rate: f64,
    pub system_health: SystemHealth,
}

/// Where the system load figure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSource {
    Measured,
    Simulated,
}

/// Model performance figures shown on the dashboard.
///
/// Values are either reported by telemetry or a jittered baseline; they are
/// display-only and never feed back into predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub classification_accuracy: f64,
    pub regression_r2: f64,
    pub total_predictions: u64,
    pub avg_response_time: f64,
    pub from_telemetry: bool,
    pub last_updated: DateTime<Utc>,
}

/// Readings refreshed by the background updater
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveReadings {
    pub active_users: u32,
    pub predictions_per_minute: usize,
    /// CPU load in percent
    pub system_load: f64,
    /// Memory usage in percent, only when measured
    pub memory_usage: Option<f64>,
    pub load_source: LoadSource,
    pub model_performance: Option<ModelPerformance>,
    pub telemetry: Option<TelemetryMetrics>,
    pub updater_state: UpdaterState,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for LiveReadings {
    fn default() -> Self {
        Self {
            active_users: 0,
            predictions_per_minute: 0,
            system_load: 0.0,
            memory_usage: None,
            load_source: LoadSource::Simulated,
            model_performance: None,
            telemetry: None,
            updater_state: UpdaterState::Idle,
            last_updated: None,
        }
    }
}

/// Which artifacts were loaded at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub classifier_loaded: bool,
    pub regressor_loaded: bool,
    pub scalers_loaded: bool,
    pub label_decoder_loaded: bool,
}

/// Headline performance figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub success_rate: f64,
    pub predictions_per_minute: usize,
    pub avg_response_time: f64,
    pub system_health: SystemHealth,
}

/// Everything the real-time dashboard shows, recomputed on each request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealTimeSnapshot {
    pub timestamp: DateTime<Utc>,
    pub system_stats: RunningStatistics,
    pub recent_predictions: Vec<ActivityEntry>,
    pub live: LiveReadings,
    pub model_status: ModelStatus,
    pub performance: PerformanceMetrics,
}
