//! Prediction result data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two models a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Classification,
    Regression,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Classification => write!(f, "Classification"),
            ModelKind::Regression => write!(f, "Regression"),
        }
    }
}

/// Eligibility outcome derived from the classifier label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EligibilityStatus {
    Eligible,
    Conditional,
    #[serde(rename = "Not Eligible")]
    NotEligible,
}

impl EligibilityStatus {
    /// Map a decoded label onto an eligibility status.
    ///
    /// Matching ignores case and treats `_` as a space. `Category_2` / `Category_1`
    /// are the synthesized labels used when no decoder is loaded.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.replace('_', " ").trim().to_lowercase();
        match normalized.as_str() {
            "eligible" | "approved" | "yes" | "category 2" => EligibilityStatus::Eligible,
            "conditional" | "review" | "category 1" => EligibilityStatus::Conditional,
            _ => EligibilityStatus::NotEligible,
        }
    }
}

/// Confidence bucket for the winning class probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_probability(probability: f64, thresholds: &ConfidenceThresholds) -> Self {
        if probability > thresholds.high {
            ConfidenceLevel::High
        } else if probability > thresholds.medium {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Probability cut-offs for [`ConfidenceLevel`] (strictly greater than)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    pub high: f64,
    pub medium: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high: 0.8,
            medium: 0.6,
        }
    }
}

/// EMI affordability risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Determine risk level from the EMI-to-income ratio (percent)
    pub fn from_ratio(ratio: f64, thresholds: &RiskLevelThresholds) -> Self {
        if ratio > thresholds.high {
            RiskLevel::High
        } else if ratio > thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// EMI-to-income ratio cut-offs in percent (strictly greater than)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLevelThresholds {
    pub medium: f64,
    pub high: f64,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            medium: 30.0,
            high: 50.0,
        }
    }
}

/// Overall risk reported by a comprehensive assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallRisk {
    Low,
    Moderate,
    High,
    Unknown,
}

impl OverallRisk {
    pub fn from_ratio(ratio: f64, thresholds: &OverallRiskThresholds) -> Self {
        if ratio < thresholds.low_below {
            OverallRisk::Low
        } else if ratio < thresholds.moderate_below {
            OverallRisk::Moderate
        } else {
            OverallRisk::High
        }
    }
}

/// EMI-to-income ratio cut-offs for [`OverallRisk`] (strictly less than)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallRiskThresholds {
    pub low_below: f64,
    pub moderate_below: f64,
}

impl Default for OverallRiskThresholds {
    fn default() -> Self {
        Self {
            low_below: 30.0,
            moderate_below: 45.0,
        }
    }
}

/// Interpreted classifier output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityPrediction {
    /// Decoded (or synthesized) class label
    pub prediction: String,
    pub class_index: usize,
    pub eligibility_status: EligibilityStatus,
    /// Probability of the winning class
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    /// Per-class probabilities, indexed by class
    pub probabilities: Vec<f64>,
    /// Seconds spent in the call
    pub elapsed_time: f64,
    pub timestamp: DateTime<Utc>,
}

/// Interpreted regressor output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmiPrediction {
    pub predicted_amount: f64,
    pub formatted_amount: String,
    /// EMI as a percentage of monthly salary
    pub emi_to_income_ratio: f64,
    pub risk_level: RiskLevel,
    pub total_payment: f64,
    pub total_interest: f64,
    /// 0-100, higher is more affordable
    pub affordability_score: f64,
    pub elapsed_time: f64,
    pub timestamp: DateTime<Utc>,
}

/// A prediction call that did not produce a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionFailure {
    pub model: ModelKind,
    pub error_message: String,
    pub elapsed_time: f64,
    pub timestamp: DateTime<Utc>,
}

/// Result of a prediction call; failures are values, never panics or errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PredictionResult {
    Eligibility(EligibilityPrediction),
    EmiAmount(EmiPrediction),
    Failure(PredictionFailure),
}

impl PredictionResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, PredictionResult::Failure(_))
    }

    pub fn model_kind(&self) -> ModelKind {
        match self {
            PredictionResult::Eligibility(_) => ModelKind::Classification,
            PredictionResult::EmiAmount(_) => ModelKind::Regression,
            PredictionResult::Failure(failure) => failure.model,
        }
    }

    pub fn elapsed_time(&self) -> f64 {
        match self {
            PredictionResult::Eligibility(p) => p.elapsed_time,
            PredictionResult::EmiAmount(p) => p.elapsed_time,
            PredictionResult::Failure(f) => f.elapsed_time,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            PredictionResult::Eligibility(p) => p.timestamp,
            PredictionResult::EmiAmount(p) => p.timestamp,
            PredictionResult::Failure(f) => f.timestamp,
        }
    }

    pub fn as_eligibility(&self) -> Option<&EligibilityPrediction> {
        match self {
            PredictionResult::Eligibility(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_emi(&self) -> Option<&EmiPrediction> {
        match self {
            PredictionResult::EmiAmount(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_failure(&self) -> Option<&PredictionFailure> {
        match self {
            PredictionResult::Failure(f) => Some(f),
            _ => None,
        }
    }
}

/// Eligibility summary in the shape front-ends expect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilitySummary {
    pub eligibility: EligibilityStatus,
    /// Winning-class probability as a percentage, 2 dp
    pub confidence: f64,
}

/// Eligibility followed, when eligible, by an EMI-amount prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComprehensiveAssessment {
    pub eligibility: EligibilitySummary,
    pub eligibility_raw: PredictionResult,
    pub emi_prediction: Option<PredictionResult>,
    pub risk_level: OverallRisk,
    pub recommendation: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Round to a fixed number of decimals for display fields
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Format an amount as rupees with thousands separators, e.g. `₹1,234,567.89`
pub fn format_inr(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}₹{grouped}.{fraction:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_from_ratio() {
        let thresholds = RiskLevelThresholds::default();

        assert_eq!(RiskLevel::from_ratio(10.0, &thresholds), RiskLevel::Low);
        assert_eq!(RiskLevel::from_ratio(30.0, &thresholds), RiskLevel::Low);
        assert_eq!(RiskLevel::from_ratio(40.0, &thresholds), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_ratio(50.0, &thresholds), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_ratio(50.1, &thresholds), RiskLevel::High);
    }

    #[test]
    fn test_confidence_buckets() {
        let thresholds = ConfidenceThresholds::default();

        assert_eq!(
            ConfidenceLevel::from_probability(0.85, &thresholds),
            ConfidenceLevel::High
        );
        assert_eq!(
            ConfidenceLevel::from_probability(0.65, &thresholds),
            ConfidenceLevel::Medium
        );
        assert_eq!(
            ConfidenceLevel::from_probability(0.5, &thresholds),
            ConfidenceLevel::Low
        );
        assert_eq!(
            ConfidenceLevel::from_probability(0.8, &thresholds),
            ConfidenceLevel::Medium
        );
    }

    #[test]
    fn test_eligibility_label_mapping() {
        assert_eq!(EligibilityStatus::from_label("Eligible"), EligibilityStatus::Eligible);
        assert_eq!(EligibilityStatus::from_label("APPROVED"), EligibilityStatus::Eligible);
        assert_eq!(EligibilityStatus::from_label("yes"), EligibilityStatus::Eligible);
        assert_eq!(EligibilityStatus::from_label("Category_2"), EligibilityStatus::Eligible);
        assert_eq!(EligibilityStatus::from_label("Review"), EligibilityStatus::Conditional);
        assert_eq!(
            EligibilityStatus::from_label("Category_1"),
            EligibilityStatus::Conditional
        );
        assert_eq!(
            EligibilityStatus::from_label("Not_Eligible"),
            EligibilityStatus::NotEligible
        );
        assert_eq!(
            EligibilityStatus::from_label("High_Risk"),
            EligibilityStatus::NotEligible
        );
    }

    #[test]
    fn test_overall_risk() {
        let thresholds = OverallRiskThresholds::default();
        assert_eq!(OverallRisk::from_ratio(29.9, &thresholds), OverallRisk::Low);
        assert_eq!(OverallRisk::from_ratio(30.0, &thresholds), OverallRisk::Moderate);
        assert_eq!(OverallRisk::from_ratio(45.0, &thresholds), OverallRisk::High);
    }

    #[test]
    fn test_format_inr() {
        assert_eq!(format_inr(20000.0), "₹20,000.00");
        assert_eq!(format_inr(1234567.891), "₹1,234,567.89");
        assert_eq!(format_inr(999.5), "₹999.50");
        assert_eq!(format_inr(0.0), "₹0.00");
    }

    #[test]
    fn test_result_serialization_is_tagged() {
        let result = PredictionResult::Failure(PredictionFailure {
            model: ModelKind::Regression,
            error_message: "Regression model not loaded".to_string(),
            elapsed_time: 0.001,
            timestamp: Utc::now(),
        });

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["outcome"], "failure");
        assert_eq!(json["model"], "regression");

        let back: PredictionResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
        assert!(!back.is_success());
    }
}
