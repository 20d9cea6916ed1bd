//! Background task that refreshes the live dashboard readings.
//!
//! Every tick samples host load, counts recent predictions in the trailing
//! window and refreshes model-performance figures. A failed tick is logged
//! and retried after a longer backoff; the loop only ends on shutdown.

use crate::clock::Clock;
use crate::config::MetricsConfig;
use crate::metrics::live::LiveMetrics;
use crate::metrics::sampler::{HostLoad, SystemSampler};
use crate::metrics::stats::StatsAggregator;
use crate::telemetry::{NoopTelemetry, TelemetryMetrics, TelemetrySource};
use crate::types::prediction::round_to;
use crate::types::snapshot::{LiveReadings, LoadSource, ModelPerformance, RunningStatistics};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Simulated load range, percent
const SIMULATED_LOAD: (f64, f64) = (20.0, 85.0);
/// Simulated active users range
const SIMULATED_USERS: (u32, u32) = (10, 100);
/// Display drift applied to the baseline accuracy when telemetry is silent
const CLASSIFICATION_JITTER: f64 = 0.02;
const REGRESSION_JITTER: f64 = 0.01;

/// Lifecycle of one tick: Idle → Sampling → (Success | ErrorBackoff) → Idle.
/// Success and ErrorBackoff last for the wait that follows the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdaterState {
    Idle,
    Sampling,
    Success,
    ErrorBackoff,
}

pub struct BackgroundMetricsUpdater {
    stats: Arc<StatsAggregator>,
    live: Arc<LiveMetrics>,
    /// `None` means no real sampler: load figures are simulated
    sampler: Option<Arc<dyn SystemSampler>>,
    telemetry: Arc<dyn TelemetrySource>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    interval: Duration,
    backoff: Duration,
    window: chrono::Duration,
}

impl BackgroundMetricsUpdater {
    pub fn new(stats: Arc<StatsAggregator>, live: Arc<LiveMetrics>, clock: Arc<dyn Clock>) -> Self {
        let defaults = MetricsConfig::default();
        Self {
            stats,
            live,
            sampler: None,
            telemetry: Arc::new(NoopTelemetry),
            clock,
            rng: Mutex::new(StdRng::from_entropy()),
            interval: defaults.interval(),
            backoff: defaults.backoff(),
            window: defaults.window(),
        }
    }

    pub fn with_sampler(mut self, sampler: Arc<dyn SystemSampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySource>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn with_timing(mut self, config: &MetricsConfig) -> Self {
        self.interval = config.interval();
        self.backoff = config.backoff();
        self.window = config.window();
        self
    }

    pub fn state(&self) -> UpdaterState {
        self.live.state()
    }

    /// Start the periodic task. It stops within one tick of a shutdown
    /// signal (or of the sender being dropped).
    pub fn spawn(self: Arc<Self>, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.interval.as_secs(),
            backoff_secs = self.backoff.as_secs(),
            simulated_load = self.sampler.is_none(),
            "Background metrics updater started"
        );

        loop {
            self.live.set_state(UpdaterState::Sampling);

            let delay = match self.tick().await {
                Ok(()) => {
                    self.live.set_state(UpdaterState::Success);
                    self.interval
                }
                Err(e) => {
                    warn!(error = %format!("{:#}", e), "Metrics tick failed, backing off");
                    self.live.set_state(UpdaterState::ErrorBackoff);
                    self.backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    info!("Background metrics updater shutdown signal received");
                    break;
                }
            }

            self.live.set_state(UpdaterState::Idle);
        }

        self.live.set_state(UpdaterState::Idle);
    }

    /// One refresh of the live readings.
    pub async fn tick(&self) -> Result<()> {
        let now = self.clock.now();

        let (system_load, memory_usage, load_source) = match self.sample_host().await? {
            Some(load) => (
                round_to(load.cpu_percent, 2),
                Some(round_to(load.memory_percent, 2)),
                LoadSource::Measured,
            ),
            None => (
                round_to(self.uniform(SIMULATED_LOAD.0, SIMULATED_LOAD.1), 2),
                None,
                LoadSource::Simulated,
            ),
        };
        let active_users = self.active_users();

        let predictions_per_minute = self.stats.count_since(now, self.window);

        let telemetry = match self.telemetry.fetch().await {
            Ok(telemetry) => telemetry,
            Err(e) => {
                debug!(error = %e, "Telemetry unavailable, using baseline");
                None
            }
        };

        let statistics = self.stats.statistics();
        let model_performance = self.model_performance(&statistics, telemetry.as_ref(), now);

        self.live.publish(LiveReadings {
            active_users,
            predictions_per_minute,
            system_load,
            memory_usage,
            load_source,
            model_performance: Some(model_performance),
            telemetry,
            updater_state: UpdaterState::Sampling,
            last_updated: Some(now),
        });

        debug!(
            system_load = system_load,
            predictions_per_minute = predictions_per_minute,
            "Live metrics refreshed"
        );
        Ok(())
    }

    /// Host reading on the blocking pool. A sampler error means no reading
    /// (load is simulated instead); only a crashed sampler task is an error.
    async fn sample_host(&self) -> Result<Option<HostLoad>> {
        let Some(sampler) = self.sampler.clone() else {
            return Ok(None);
        };

        match tokio::task::spawn_blocking(move || sampler.sample())
            .await
            .context("Host sampler task aborted")?
        {
            Ok(load) => Ok(Some(load)),
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Host sampling failed, simulating load");
                Ok(None)
            }
        }
    }

    /// Telemetry figures where reported, jittered baseline otherwise.
    fn model_performance(
        &self,
        statistics: &RunningStatistics,
        telemetry: Option<&TelemetryMetrics>,
        now: DateTime<Utc>,
    ) -> ModelPerformance {
        let baseline = statistics.model_accuracy;

        let classification_accuracy = telemetry
            .and_then(|t| t.classification_accuracy)
            .unwrap_or_else(|| self.jitter(baseline.classification, CLASSIFICATION_JITTER));
        let regression_r2 = telemetry
            .and_then(|t| t.regression_r2)
            .unwrap_or_else(|| self.jitter(baseline.regression, REGRESSION_JITTER));

        ModelPerformance {
            classification_accuracy,
            regression_r2,
            total_predictions: telemetry
                .and_then(|t| t.total_predictions)
                .unwrap_or(statistics.total_predictions),
            avg_response_time: telemetry
                .and_then(|t| t.avg_response_time)
                .unwrap_or(statistics.avg_prediction_time),
            from_telemetry: telemetry.is_some(),
            last_updated: telemetry.map(|t| t.last_updated).unwrap_or(now),
        }
    }

    fn uniform(&self, low: f64, high: f64) -> f64 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(low..=high)
    }

    fn active_users(&self) -> u32 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(SIMULATED_USERS.0..=SIMULATED_USERS.1)
    }

    fn jitter(&self, base: f64, spread: f64) -> f64 {
        round_to((base + self.uniform(-spread, spread)).clamp(0.0, 1.0), 4)
    }
}
