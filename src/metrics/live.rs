//! Live readings shared between the background updater and snapshot readers

use crate::metrics::updater::UpdaterState;
use crate::types::snapshot::LiveReadings;
use std::sync::{PoisonError, RwLock};

/// Latest readings published by the background updater.
///
/// The updater is the only writer; snapshot readers take cheap clones.
#[derive(Debug, Default)]
pub struct LiveMetrics {
    readings: RwLock<LiveReadings>,
}

impl LiveMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> LiveReadings {
        self.readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace all readings at once, keeping the updater state.
    pub fn publish(&self, mut readings: LiveReadings) {
        let mut current = self.readings.write().unwrap_or_else(PoisonError::into_inner);
        readings.updater_state = current.updater_state;
        *current = readings;
    }

    pub fn set_state(&self, state: UpdaterState) {
        self.readings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .updater_state = state;
    }

    pub fn state(&self) -> UpdaterState {
        self.readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .updater_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_keeps_state() {
        let live = LiveMetrics::new();
        live.set_state(UpdaterState::Sampling);

        live.publish(LiveReadings {
            active_users: 42,
            ..LiveReadings::default()
        });

        let current = live.current();
        assert_eq!(current.active_users, 42);
        assert_eq!(current.updater_state, UpdaterState::Sampling);
    }
}
