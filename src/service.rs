//! Request dispatch for the NATS request/reply surface.
//!
//! Requests arrive on `<prefix>.<suffix>`; the suffix picks the operation and
//! the payload is JSON. Every request gets a JSON reply, errors included.

use crate::orchestrator::PredictionOrchestrator;
use crate::types::profile::CustomerProfile;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::fmt;

/// Operation selected by the subject suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Eligibility,
    EmiAmount,
    Comprehensive,
    Dashboard,
    Samples,
    ModelStatus,
}

impl RequestKind {
    pub const ALL: [RequestKind; 6] = [
        RequestKind::Eligibility,
        RequestKind::EmiAmount,
        RequestKind::Comprehensive,
        RequestKind::Dashboard,
        RequestKind::Samples,
        RequestKind::ModelStatus,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            RequestKind::Eligibility => "eligibility",
            RequestKind::EmiAmount => "emi_amount",
            RequestKind::Comprehensive => "comprehensive",
            RequestKind::Dashboard => "dashboard",
            RequestKind::Samples => "samples",
            RequestKind::ModelStatus => "model_status",
        }
    }

    /// `None` for subjects outside `<prefix>.` or with an unknown suffix.
    pub fn from_subject(prefix: &str, subject: &str) -> Option<Self> {
        let suffix = subject.strip_prefix(prefix)?.strip_prefix('.')?;
        Self::ALL.into_iter().find(|kind| kind.suffix() == suffix)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

#[derive(Debug, Deserialize)]
struct SamplesRequest {
    #[serde(default = "default_sample_count")]
    count: usize,
}

fn default_sample_count() -> usize {
    5
}

/// Run one request and serialize the reply.
///
/// Malformed payloads produce `{"error": "..."}`; prediction failures are
/// ordinary results and serialize as such.
pub fn handle_request(
    orchestrator: &PredictionOrchestrator,
    kind: RequestKind,
    payload: &[u8],
) -> Vec<u8> {
    match dispatch(orchestrator, kind, payload) {
        Ok(reply) => reply,
        Err(e) => error_reply(&format!("{:#}", e)),
    }
}

pub fn error_reply(message: &str) -> Vec<u8> {
    json!({ "error": message }).to_string().into_bytes()
}

fn dispatch(
    orchestrator: &PredictionOrchestrator,
    kind: RequestKind,
    payload: &[u8],
) -> Result<Vec<u8>> {
    let reply = match kind {
        RequestKind::Eligibility => {
            let profile: CustomerProfile = parse(payload)?;
            serde_json::to_vec(&orchestrator.predict_eligibility(&profile))
        }
        RequestKind::EmiAmount => {
            let profile: CustomerProfile = parse(payload)?;
            serde_json::to_vec(&orchestrator.predict_emi_amount(&profile))
        }
        RequestKind::Comprehensive => {
            let profile: CustomerProfile = parse(payload)?;
            serde_json::to_vec(&orchestrator.predict_comprehensive(&profile))
        }
        RequestKind::Samples => {
            let request: SamplesRequest = parse(payload)?;
            serde_json::to_vec(&orchestrator.generate_sample_predictions(request.count))
        }
        RequestKind::Dashboard => serde_json::to_vec(&orchestrator.get_snapshot()),
        RequestKind::ModelStatus => serde_json::to_vec(&orchestrator.model_status()),
    };
    reply.context("Failed to serialize reply")
}

/// An empty payload means "all defaults".
fn parse<T: for<'de> Deserialize<'de>>(payload: &[u8]) -> Result<T> {
    let payload = if payload.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        payload
    };
    serde_json::from_slice(payload).context("Malformed request payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::BaselineAccuracy;
    use crate::metrics::{LiveMetrics, StatsAggregator};
    use crate::models::ModelGateway;
    use serde_json::Value;
    use std::sync::Arc;

    fn orchestrator() -> PredictionOrchestrator {
        let clock = Arc::new(SystemClock);
        let stats = Arc::new(StatsAggregator::new(clock.clone(), BaselineAccuracy::default()));
        PredictionOrchestrator::new(ModelGateway::empty(), stats, Arc::new(LiveMetrics::new()), clock)
    }

    fn reply(kind: RequestKind, payload: &str) -> Value {
        serde_json::from_slice(&handle_request(&orchestrator(), kind, payload.as_bytes())).unwrap()
    }

    #[test]
    fn test_subject_routing() {
        assert_eq!(
            RequestKind::from_subject("emi", "emi.eligibility"),
            Some(RequestKind::Eligibility)
        );
        assert_eq!(
            RequestKind::from_subject("emi", "emi.emi_amount"),
            Some(RequestKind::EmiAmount)
        );
        assert_eq!(
            RequestKind::from_subject("loans.v1", "loans.v1.model_status"),
            Some(RequestKind::ModelStatus)
        );
        assert_eq!(RequestKind::from_subject("emi", "emi.snapshot"), None);
        assert_eq!(RequestKind::from_subject("emi", "emieligibility"), None);
        assert_eq!(RequestKind::from_subject("emi", "other.eligibility"), None);

        for kind in RequestKind::ALL {
            let subject = format!("emi.{kind}");
            assert_eq!(RequestKind::from_subject("emi", &subject), Some(kind));
        }
    }

    #[test]
    fn test_malformed_payload_gets_error_reply() {
        let value = reply(RequestKind::Eligibility, "{not json");
        assert!(value["error"]
            .as_str()
            .unwrap()
            .starts_with("Malformed request payload"));

        let value = reply(RequestKind::EmiAmount, r#"{"monthly_salary": "lots"}"#);
        assert!(value.get("error").is_some());
    }

    #[test]
    fn test_prediction_failure_is_a_normal_reply() {
        let value = reply(RequestKind::Eligibility, r#"{"age": 35, "income": 80000}"#);
        assert_eq!(value["outcome"], "failure");
        assert_eq!(value["error_message"], "Classification model not loaded");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_empty_payload_uses_defaults() {
        let value = reply(RequestKind::Samples, "");
        assert_eq!(value.as_array().unwrap().len(), 5);

        let value = reply(RequestKind::Samples, r#"{"count": 2}"#);
        let samples = value.as_array().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0]["customer_data"]["monthly_salary"], 75000.0);
        assert_eq!(samples[0]["classification_result"]["outcome"], "failure");
    }

    #[test]
    fn test_dashboard_and_status() {
        let value = reply(RequestKind::ModelStatus, "");
        assert_eq!(value["classifier_loaded"], false);

        let engine = orchestrator();
        handle_request(&engine, RequestKind::Comprehensive, b"{}");
        let value: Value =
            serde_json::from_slice(&handle_request(&engine, RequestKind::Dashboard, b"")).unwrap();
        assert_eq!(value["system_stats"]["total_predictions"], 1);
        assert_eq!(value["live"]["updater_state"], "idle");
        assert_eq!(value["performance"]["system_health"], "Needs Attention");
    }
}
