//! EMI Risk Engine Library
//!
//! Real-time loan (EMI) eligibility and affordability assessment over two
//! pre-trained models, with running operational statistics for a live
//! monitoring dashboard.

pub mod clock;
pub mod config;
pub mod consumer;
pub mod error;
pub mod feature_encoder;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod producer;
pub mod service;
pub mod telemetry;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::PredictionError;
pub use feature_encoder::{FeatureEncoder, FeatureVector};
pub use models::ModelGateway;
pub use orchestrator::PredictionOrchestrator;
pub use producer::ResponsePublisher;
pub use types::{CustomerProfile, PredictionResult, RealTimeSnapshot};
