//! Running prediction statistics and the recent-activity log.

use crate::clock::Clock;
use crate::config::BaselineAccuracy;
use crate::types::prediction::PredictionResult;
use crate::types::profile::CustomerProfile;
use crate::types::snapshot::{ActivityEntry, RunningStatistics, StatsSnapshot, SystemHealth};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Default capacity of the recent-activity log
pub const RECENT_CAPACITY: usize = 50;

struct StatsState {
    statistics: RunningStatistics,
    recent: VecDeque<ActivityEntry>,
}

impl StatsState {
    /// `avg = (avg * (n - 1) + elapsed) / n` with `n` the post-increment total.
    fn count(&mut self, success: bool, elapsed: Duration) {
        let stats = &mut self.statistics;

        stats.total_predictions += 1;
        if success {
            stats.successful_predictions += 1;
        } else {
            stats.failed_predictions += 1;
        }

        let n = stats.total_predictions as f64;
        stats.avg_prediction_time =
            (stats.avg_prediction_time * (n - 1.0) + elapsed.as_secs_f64()) / n;
    }

    fn push(&mut self, entry: ActivityEntry, capacity: usize) {
        self.recent.push_back(entry);
        while self.recent.len() > capacity {
            self.recent.pop_front();
        }
    }
}

/// Thread-safe owner of [`RunningStatistics`] and the recent-activity log.
///
/// Counters, the running mean and the log sit behind one mutex, so every
/// read sees them in a mutually consistent state.
pub struct StatsAggregator {
    state: Mutex<StatsState>,
    clock: Arc<dyn Clock>,
    capacity: usize,
}

impl StatsAggregator {
    pub fn new(clock: Arc<dyn Clock>, model_accuracy: BaselineAccuracy) -> Self {
        Self::with_capacity(clock, model_accuracy, RECENT_CAPACITY)
    }

    pub fn with_capacity(
        clock: Arc<dyn Clock>,
        model_accuracy: BaselineAccuracy,
        capacity: usize,
    ) -> Self {
        Self {
            state: Mutex::new(StatsState {
                statistics: RunningStatistics::new(model_accuracy),
                recent: VecDeque::with_capacity(capacity + 1),
            }),
            clock,
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(&self, result: &PredictionResult, input: &CustomerProfile) -> ActivityEntry {
        ActivityEntry {
            id: Uuid::new_v4(),
            result: result.clone(),
            input: input.clone(),
            timestamp: self.clock.now(),
        }
    }

    /// Count one completed call and log it in a single critical section, so
    /// no reader sees the counters and the log disagree.
    pub fn record_call(
        &self,
        result: &PredictionResult,
        input: &CustomerProfile,
        elapsed: Duration,
    ) {
        let entry = self.entry(result, input);

        let mut state = self.lock();
        state.count(result.is_success(), elapsed);
        state.push(entry, self.capacity);
    }

    /// Counters and running mean only.
    pub fn record(&self, success: bool, elapsed: Duration) {
        self.lock().count(success, elapsed);
    }

    /// Append to the activity log, evicting the oldest entry past capacity.
    pub fn append_recent(&self, result: &PredictionResult, input: &CustomerProfile) {
        let entry = self.entry(result, input);
        self.lock().push(entry, self.capacity);
    }

    /// Point-in-time copy of counters, log and derived health.
    pub fn snapshot(&self) -> StatsSnapshot {
        let state = self.lock();
        let success_rate = state.statistics.success_rate();

        StatsSnapshot {
            statistics: state.statistics.clone(),
            recent_predictions: state.recent.iter().cloned().collect(),
            success_rate,
            system_health: SystemHealth::from_success_rate(success_rate),
        }
    }

    pub fn statistics(&self) -> RunningStatistics {
        self.lock().statistics.clone()
    }

    /// Log entries stamped strictly after `now - window`.
    pub fn count_since(&self, now: DateTime<Utc>, window: ChronoDuration) -> usize {
        let cutoff = now - window;
        self.lock()
            .recent
            .iter()
            .filter(|entry| entry.timestamp > cutoff)
            .count()
    }

    pub fn recent_len(&self) -> usize {
        self.lock().recent.len()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let stats = &snapshot.statistics;

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              EMI RISK ENGINE - PREDICTION SUMMARY             ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Predictions: {:>8}  │  Successful: {:>8}  │  Failed: {:>6} ║",
            stats.total_predictions, stats.successful_predictions, stats.failed_predictions
        );
        info!(
            "║ Success Rate: {:>6.1}%  │  Avg Latency: {:>8.2} ms            ║",
            snapshot.success_rate * 100.0,
            stats.avg_prediction_time * 1000.0
        );
        info!(
            "║ System Health: {:<16} │  Recent Log: {:>3} entries     ║",
            format!("{:?}", snapshot.system_health),
            snapshot.recent_predictions.len()
        );
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}
