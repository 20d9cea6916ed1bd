//! Errors raised on the prediction path.
//!
//! None of these reach callers of the orchestrator: they are folded into
//! [`PredictionResult::Failure`](crate::types::PredictionResult::Failure).

use crate::types::ModelKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictionError {
    /// The required model artifact was not loaded at startup.
    #[error("{0} model not loaded")]
    ModelUnavailable(ModelKind),

    /// Encoding is total today; kept so encoder changes have somewhere to report.
    #[error("feature encoding failed: {0}")]
    FeatureEncoding(String),

    /// The model call itself failed (runtime error, shape mismatch, bad output).
    #[error("prediction backend error: {0}")]
    Backend(String),

    /// Profile values make the derived figures undefined.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<ort::Error> for PredictionError {
    fn from(err: ort::Error) -> Self {
        PredictionError::Backend(err.to_string())
    }
}
