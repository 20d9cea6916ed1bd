//! End-to-end predict → interpret flows.
//!
//! Every call is timed and recorded, success or not. Model and input errors
//! never escape: they come back as [`PredictionResult::Failure`].

use crate::clock::Clock;
use crate::config::AssessmentConfig;
use crate::error::PredictionError;
use crate::feature_encoder::FeatureEncoder;
use crate::metrics::{LiveMetrics, StatsAggregator};
use crate::models::{ClassifierOutput, ModelGateway};
use crate::types::prediction::{
    format_inr, round_to, ComprehensiveAssessment, ConfidenceLevel, EligibilityPrediction,
    EligibilityStatus, EligibilitySummary, EmiPrediction, ModelKind, OverallRisk,
    PredictionFailure, PredictionResult, RiskLevel,
};
use crate::types::profile::CustomerProfile;
use crate::types::snapshot::{ModelStatus, PerformanceMetrics, RealTimeSnapshot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const NOT_ELIGIBLE_RECOMMENDATION: &str =
    "Not eligible for EMI. Consider improving credit score or reducing existing debt.";

/// One demo customer with both predictions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePrediction {
    pub customer_data: CustomerProfile,
    pub classification_result: PredictionResult,
    pub regression_result: PredictionResult,
}

pub struct PredictionOrchestrator {
    encoder: FeatureEncoder,
    gateway: ModelGateway,
    stats: Arc<StatsAggregator>,
    live: Arc<LiveMetrics>,
    clock: Arc<dyn Clock>,
    assessment: AssessmentConfig,
}

impl PredictionOrchestrator {
    pub fn new(
        gateway: ModelGateway,
        stats: Arc<StatsAggregator>,
        live: Arc<LiveMetrics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            encoder: FeatureEncoder::new(),
            gateway,
            stats,
            live,
            clock,
            assessment: AssessmentConfig::default(),
        }
    }

    pub fn with_assessment(mut self, assessment: AssessmentConfig) -> Self {
        self.assessment = assessment;
        self
    }

    pub fn stats(&self) -> &Arc<StatsAggregator> {
        &self.stats
    }

    /// Classify the profile and interpret the winning class.
    pub fn predict_eligibility(&self, profile: &CustomerProfile) -> PredictionResult {
        let started = Instant::now();
        let outcome = self.classify(profile);
        let elapsed = started.elapsed();

        let result = match outcome {
            Ok((output, label)) => {
                let confidence = output.confidence();
                PredictionResult::Eligibility(EligibilityPrediction {
                    eligibility_status: EligibilityStatus::from_label(&label),
                    prediction: label,
                    class_index: output.class_index,
                    confidence,
                    confidence_level: ConfidenceLevel::from_probability(
                        confidence,
                        &self.assessment.confidence,
                    ),
                    probabilities: output.probabilities,
                    elapsed_time: elapsed.as_secs_f64(),
                    timestamp: self.clock.now(),
                })
            }
            Err(e) => self.failure(ModelKind::Classification, e, elapsed),
        };

        self.finish(&result, profile, elapsed);
        result
    }

    fn classify(
        &self,
        profile: &CustomerProfile,
    ) -> Result<(ClassifierOutput, String), PredictionError> {
        let features = self.encoder.encode(profile);
        let output = self.gateway.predict_classification(&features)?;

        let label = match self.gateway.decode_label(output.class_index) {
            Some(decoded) => decoded?,
            None => format!("Category_{}", output.class_index),
        };
        Ok((output, label))
    }

    /// Predict the EMI amount and derive affordability figures.
    pub fn predict_emi_amount(&self, profile: &CustomerProfile) -> PredictionResult {
        let started = Instant::now();
        let outcome = self.regress(profile);
        let elapsed = started.elapsed();

        let result = match outcome {
            Ok(amount) => PredictionResult::EmiAmount(self.interpret_emi(
                amount,
                profile,
                elapsed,
            )),
            Err(e) => self.failure(ModelKind::Regression, e, elapsed),
        };

        self.finish(&result, profile, elapsed);
        result
    }

    fn regress(&self, profile: &CustomerProfile) -> Result<f64, PredictionError> {
        let features = self.encoder.encode(profile);
        let amount = self.gateway.predict_regression(&features)?;

        if profile.monthly_salary.is_nan() || profile.monthly_salary <= 0.0 {
            return Err(PredictionError::InvalidInput(format!(
                "monthly_salary must be positive, got {}",
                profile.monthly_salary
            )));
        }
        Ok(amount)
    }

    fn interpret_emi(
        &self,
        amount: f64,
        profile: &CustomerProfile,
        elapsed: Duration,
    ) -> EmiPrediction {
        let ratio = amount / profile.monthly_salary * 100.0;
        let total_payment = amount * profile.requested_tenure;
        let total_interest = total_payment - profile.requested_amount;
        let affordability = (100.0 - (ratio - 20.0) * 2.0).clamp(0.0, 100.0);

        EmiPrediction {
            predicted_amount: amount,
            formatted_amount: format_inr(amount),
            emi_to_income_ratio: round_to(ratio, 2),
            risk_level: RiskLevel::from_ratio(ratio, &self.assessment.risk_levels),
            total_payment: round_to(total_payment, 2),
            total_interest: round_to(total_interest, 2),
            affordability_score: round_to(affordability, 1),
            elapsed_time: elapsed.as_secs_f64(),
            timestamp: self.clock.now(),
        }
    }

    /// Eligibility, then the EMI amount for eligible customers only.
    pub fn predict_comprehensive(&self, profile: &CustomerProfile) -> ComprehensiveAssessment {
        let eligibility_raw = self.predict_eligibility(profile);

        let eligibility = match eligibility_raw.as_eligibility() {
            Some(p) => EligibilitySummary {
                eligibility: p.eligibility_status,
                confidence: round_to(p.confidence * 100.0, 2),
            },
            None => EligibilitySummary {
                eligibility: EligibilityStatus::NotEligible,
                confidence: 0.0,
            },
        };

        let (emi_prediction, risk_level, recommendation) = if !eligibility_raw.is_success() {
            (None, OverallRisk::Unknown, None)
        } else if eligibility.eligibility == EligibilityStatus::Eligible {
            let emi = self.predict_emi_amount(profile);
            let risk = emi
                .as_emi()
                .map(|p| OverallRisk::from_ratio(p.emi_to_income_ratio, &self.assessment.overall))
                .unwrap_or(OverallRisk::Unknown);
            (Some(emi), risk, None)
        } else {
            (
                None,
                OverallRisk::High,
                Some(NOT_ELIGIBLE_RECOMMENDATION.to_string()),
            )
        };

        ComprehensiveAssessment {
            eligibility,
            eligibility_raw,
            emi_prediction,
            risk_level,
            recommendation,
            timestamp: self.clock.now(),
        }
    }

    /// Both predictions for the first `n` built-in demo customers, in order.
    pub fn generate_sample_predictions(&self, n: usize) -> Vec<SamplePrediction> {
        CustomerProfile::samples()
            .into_iter()
            .take(n)
            .map(|customer| SamplePrediction {
                classification_result: self.predict_eligibility(&customer),
                regression_result: self.predict_emi_amount(&customer),
                customer_data: customer,
            })
            .collect()
    }

    pub fn model_status(&self) -> ModelStatus {
        self.gateway.status()
    }

    /// Everything the dashboard shows, assembled now.
    pub fn get_snapshot(&self) -> RealTimeSnapshot {
        let stats = self.stats.snapshot();
        let live = self.live.current();

        let performance = PerformanceMetrics {
            success_rate: stats.success_rate,
            predictions_per_minute: live.predictions_per_minute,
            avg_response_time: stats.statistics.avg_prediction_time,
            system_health: stats.system_health,
        };

        RealTimeSnapshot {
            timestamp: self.clock.now(),
            system_stats: stats.statistics,
            recent_predictions: stats.recent_predictions,
            live,
            model_status: self.model_status(),
            performance,
        }
    }

    fn failure(&self, model: ModelKind, error: PredictionError, elapsed: Duration) -> PredictionResult {
        PredictionResult::Failure(PredictionFailure {
            model,
            error_message: error.to_string(),
            elapsed_time: elapsed.as_secs_f64(),
            timestamp: self.clock.now(),
        })
    }

    fn finish(&self, result: &PredictionResult, profile: &CustomerProfile, elapsed: Duration) {
        self.stats.record_call(result, profile, elapsed);

        match result {
            PredictionResult::Failure(f) => {
                warn!(model = %f.model, error = %f.error_message, "Prediction failed");
            }
            _ => {
                debug!(
                    model = %result.model_kind(),
                    elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                    "Prediction completed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::BaselineAccuracy;
    use crate::models::{Classifier, LabelDecoder, Regressor};
    use crate::types::snapshot::SystemHealth;
    use chrono::Utc;

    struct FixedClassifier(Vec<f64>);

    impl Classifier for FixedClassifier {
        fn predict_proba(&self, _features: &[f32]) -> Result<Vec<f64>, PredictionError> {
            Ok(self.0.clone())
        }
    }

    struct FixedRegressor(f64);

    impl Regressor for FixedRegressor {
        fn predict(&self, _features: &[f32]) -> Result<f64, PredictionError> {
            Ok(self.0)
        }
    }

    struct BrokenClassifier;

    impl Classifier for BrokenClassifier {
        fn predict_proba(&self, _features: &[f32]) -> Result<Vec<f64>, PredictionError> {
            Err(PredictionError::Backend("input shape mismatch".to_string()))
        }
    }

    struct Labels(Vec<&'static str>);

    impl LabelDecoder for Labels {
        fn inverse_transform(&self, class_index: usize) -> Result<String, PredictionError> {
            self.0
                .get(class_index)
                .map(|s| s.to_string())
                .ok_or_else(|| PredictionError::Backend(format!("unknown class {class_index}")))
        }
    }

    fn orchestrator(gateway: ModelGateway) -> PredictionOrchestrator {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let stats = Arc::new(StatsAggregator::new(clock.clone(), BaselineAccuracy::default()));
        PredictionOrchestrator::new(gateway, stats, Arc::new(LiveMetrics::new()), clock)
    }

    fn classifier(probabilities: &[f64]) -> ModelGateway {
        ModelGateway::empty().with_classifier(Arc::new(FixedClassifier(probabilities.to_vec())))
    }

    #[test]
    fn test_emi_derived_metrics() {
        let engine = orchestrator(ModelGateway::empty().with_regressor(Arc::new(FixedRegressor(20_000.0))));
        let profile = CustomerProfile {
            monthly_salary: 50_000.0,
            requested_amount: 500_000.0,
            requested_tenure: 36.0,
            ..CustomerProfile::default()
        };

        let result = engine.predict_emi_amount(&profile);
        let emi = result.as_emi().unwrap();
        assert_eq!(emi.predicted_amount, 20_000.0);
        assert_eq!(emi.emi_to_income_ratio, 40.0);
        assert_eq!(emi.risk_level, RiskLevel::Medium);
        assert_eq!(emi.affordability_score, 60.0);
        assert_eq!(emi.total_payment, 720_000.0);
        assert_eq!(emi.total_interest, 220_000.0);
        assert_eq!(emi.formatted_amount, "₹20,000.00");

        let stats = engine.stats().statistics();
        assert_eq!(stats.total_predictions, 1);
        assert_eq!(stats.successful_predictions, 1);
    }

    #[test]
    fn test_affordability_is_clamped() {
        let engine = orchestrator(ModelGateway::empty().with_regressor(Arc::new(FixedRegressor(45_000.0))));
        let emi = engine.predict_emi_amount(&CustomerProfile::default());
        let emi = emi.as_emi().unwrap();
        assert_eq!(emi.risk_level, RiskLevel::High);
        assert_eq!(emi.affordability_score, 0.0);

        let engine = orchestrator(ModelGateway::empty().with_regressor(Arc::new(FixedRegressor(1_000.0))));
        let emi = engine.predict_emi_amount(&CustomerProfile::default());
        let emi = emi.as_emi().unwrap();
        assert_eq!(emi.risk_level, RiskLevel::Low);
        assert_eq!(emi.affordability_score, 100.0);
    }

    #[test]
    fn test_zero_salary_is_a_failure() {
        let engine = orchestrator(ModelGateway::empty().with_regressor(Arc::new(FixedRegressor(20_000.0))));
        let profile = CustomerProfile {
            monthly_salary: 0.0,
            ..CustomerProfile::default()
        };

        let result = engine.predict_emi_amount(&profile);
        let failure = result.as_failure().unwrap();
        assert!(failure.error_message.contains("monthly_salary"));
        assert_eq!(engine.stats().statistics().failed_predictions, 1);
    }

    #[test]
    fn test_confidence_levels_and_synthesized_label() {
        for (probabilities, level) in [
            (vec![0.15, 0.85], ConfidenceLevel::High),
            (vec![0.35, 0.65], ConfidenceLevel::Medium),
            (vec![0.5, 0.3, 0.2], ConfidenceLevel::Low),
        ] {
            let engine = orchestrator(classifier(&probabilities));
            let result = engine.predict_eligibility(&CustomerProfile::default());
            let prediction = result.as_eligibility().unwrap();
            assert_eq!(prediction.confidence_level, level);
            assert_eq!(prediction.probabilities, probabilities);
        }

        let engine = orchestrator(classifier(&[0.1, 0.2, 0.7]));
        let result = engine.predict_eligibility(&CustomerProfile::default());
        let prediction = result.as_eligibility().unwrap();
        assert_eq!(prediction.prediction, "Category_2");
        assert_eq!(prediction.class_index, 2);
        assert_eq!(prediction.eligibility_status, EligibilityStatus::Eligible);
    }

    #[test]
    fn test_decoded_labels() {
        let gateway = classifier(&[0.1, 0.9])
            .with_label_decoder(Arc::new(Labels(vec!["Eligible", "Not_Eligible"])));
        let engine = orchestrator(gateway);

        let result = engine.predict_eligibility(&CustomerProfile::default());
        let prediction = result.as_eligibility().unwrap();
        assert_eq!(prediction.prediction, "Not_Eligible");
        assert_eq!(prediction.eligibility_status, EligibilityStatus::NotEligible);

        let gateway = classifier(&[0.1, 0.1, 0.8]).with_label_decoder(Arc::new(Labels(vec!["Eligible"])));
        let engine = orchestrator(gateway);
        assert!(!engine.predict_eligibility(&CustomerProfile::default()).is_success());
    }

    #[test]
    fn test_missing_models_fail_and_are_counted() {
        let engine = orchestrator(ModelGateway::empty());
        let profile = CustomerProfile::default();

        let eligibility = engine.predict_eligibility(&profile);
        let emi = engine.predict_emi_amount(&profile);

        assert_eq!(
            eligibility.as_failure().unwrap().error_message,
            "Classification model not loaded"
        );
        assert_eq!(emi.as_failure().unwrap().model, ModelKind::Regression);

        let snapshot = engine.stats().snapshot();
        assert_eq!(snapshot.statistics.total_predictions, 2);
        assert_eq!(snapshot.statistics.failed_predictions, 2);
        assert_eq!(snapshot.recent_predictions.len(), 2);
        assert_eq!(snapshot.system_health, SystemHealth::NeedsAttention);
    }

    #[test]
    fn test_backend_error_becomes_failure() {
        let engine = orchestrator(ModelGateway::empty().with_classifier(Arc::new(BrokenClassifier)));
        let result = engine.predict_eligibility(&CustomerProfile::default());
        assert!(result
            .as_failure()
            .unwrap()
            .error_message
            .contains("input shape mismatch"));
        assert_eq!(engine.stats().statistics().failed_predictions, 1);
    }

    #[test]
    fn test_sample_predictions_follow_fixture_order() {
        let engine = orchestrator(classifier(&[0.3, 0.7]).with_regressor(Arc::new(FixedRegressor(15_000.0))));

        let samples = engine.generate_sample_predictions(3);
        let fixtures = CustomerProfile::samples();
        assert_eq!(samples.len(), 3);
        for (sample, fixture) in samples.iter().zip(&fixtures) {
            assert_eq!(&sample.customer_data, fixture);
            assert!(sample.classification_result.as_eligibility().is_some());
            assert!(sample.regression_result.as_emi().is_some());
        }

        assert_eq!(engine.generate_sample_predictions(99).len(), fixtures.len());
        assert!(engine.generate_sample_predictions(0).is_empty());
        assert_eq!(engine.stats().statistics().total_predictions, 16);
    }

    #[test]
    fn test_comprehensive_eligible() {
        // Category_2 maps to Eligible
        let engine = orchestrator(
            classifier(&[0.05, 0.05, 0.9]).with_regressor(Arc::new(FixedRegressor(20_000.0))),
        );
        let assessment = engine.predict_comprehensive(&CustomerProfile::default());

        assert_eq!(assessment.eligibility.eligibility, EligibilityStatus::Eligible);
        assert_eq!(assessment.eligibility.confidence, 90.0);
        assert!(assessment.emi_prediction.as_ref().unwrap().is_success());
        assert_eq!(assessment.risk_level, OverallRisk::Moderate);
        assert!(assessment.recommendation.is_none());
    }

    #[test]
    fn test_comprehensive_not_eligible() {
        let engine = orchestrator(classifier(&[0.8, 0.2]).with_regressor(Arc::new(FixedRegressor(20_000.0))));
        let assessment = engine.predict_comprehensive(&CustomerProfile::default());

        assert_eq!(assessment.eligibility.eligibility, EligibilityStatus::NotEligible);
        assert!(assessment.emi_prediction.is_none());
        assert_eq!(assessment.risk_level, OverallRisk::High);
        assert_eq!(
            assessment.recommendation.as_deref(),
            Some(NOT_ELIGIBLE_RECOMMENDATION)
        );
        // the regressor was never called
        assert_eq!(engine.stats().statistics().total_predictions, 1);
    }

    #[test]
    fn test_comprehensive_without_regressor() {
        let engine = orchestrator(classifier(&[0.0, 0.0, 1.0]));
        let assessment = engine.predict_comprehensive(&CustomerProfile::default());
        assert!(!assessment.emi_prediction.unwrap().is_success());
        assert_eq!(assessment.risk_level, OverallRisk::Unknown);

        let engine = orchestrator(ModelGateway::empty());
        let assessment = engine.predict_comprehensive(&CustomerProfile::default());
        assert_eq!(assessment.risk_level, OverallRisk::Unknown);
        assert!(assessment.recommendation.is_none());
    }

    #[test]
    fn test_snapshot_reflects_calls() {
        let engine = orchestrator(classifier(&[0.2, 0.8]));
        engine.predict_eligibility(&CustomerProfile::default());
        engine.predict_emi_amount(&CustomerProfile::default());

        let snapshot = engine.get_snapshot();
        assert_eq!(snapshot.system_stats.total_predictions, 2);
        assert_eq!(snapshot.performance.success_rate, 0.5);
        assert_eq!(snapshot.recent_predictions.len(), 2);
        assert!(snapshot.model_status.classifier_loaded);
        assert!(!snapshot.model_status.regressor_loaded);
    }

    #[test]
    fn test_concurrent_callers() {
        let engine = Arc::new(orchestrator(classifier(&[0.2, 0.8])));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        engine.predict_eligibility(&CustomerProfile::default());
                        engine.predict_emi_amount(&CustomerProfile::default());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = engine.stats().statistics();
        assert_eq!(stats.total_predictions, 200);
        assert_eq!(stats.successful_predictions, 100);
        assert_eq!(stats.failed_predictions, 100);
        assert_eq!(engine.stats().recent_len(), 50);
    }
}
