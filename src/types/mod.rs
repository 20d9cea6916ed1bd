//! Type definitions for the EMI risk engine

pub mod prediction;
pub mod profile;
pub mod snapshot;

pub use prediction::{ModelKind, PredictionResult, RiskLevel};
pub use profile::CustomerProfile;
pub use snapshot::RealTimeSnapshot;
