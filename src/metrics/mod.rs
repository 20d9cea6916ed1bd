pub mod live;
pub mod sampler;
pub mod stats;
pub mod updater;

pub use live::LiveMetrics;
pub use sampler::{HostLoad, SysinfoSampler, SystemSampler};
pub use stats::{StatsAggregator, RECENT_CAPACITY};
pub use updater::{BackgroundMetricsUpdater, UpdaterState};
