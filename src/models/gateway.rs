//! Adapter over the externally trained model artifacts

use crate::error::PredictionError;
use crate::feature_encoder::FeatureVector;
use crate::types::snapshot::ModelStatus;
use crate::types::ModelKind;
use std::sync::Arc;

/// Feature scaling applied before a model sees the vector.
pub trait Scaler: Send + Sync {
    fn transform(&self, features: &[f32]) -> Result<Vec<f32>, PredictionError>;
}

/// Eligibility classifier.
pub trait Classifier: Send + Sync {
    /// Probability per class, indexed by class.
    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f64>, PredictionError>;

    /// Winning class index.
    fn predict(&self, features: &[f32]) -> Result<usize, PredictionError> {
        let probabilities = self.predict_proba(features)?;
        argmax(&probabilities)
            .ok_or_else(|| PredictionError::Backend("classifier returned no classes".to_string()))
    }
}

/// EMI-amount regressor.
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &[f32]) -> Result<f64, PredictionError>;
}

/// Maps class indices back to the labels used in training.
pub trait LabelDecoder: Send + Sync {
    fn inverse_transform(&self, class_index: usize) -> Result<String, PredictionError>;
}

/// Classifier output as consumed by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierOutput {
    pub class_index: usize,
    pub probabilities: Vec<f64>,
}

impl ClassifierOutput {
    /// Probability of the winning class, 0 when the class is out of range
    pub fn confidence(&self) -> f64 {
        self.probabilities
            .get(self.class_index)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Index of the largest value; the first one wins ties.
pub(crate) fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// The four independently optional artifacts (two scalers, one per model).
///
/// A missing scaler means identity scaling; a missing model makes the
/// corresponding prediction fail with [`PredictionError::ModelUnavailable`].
#[derive(Clone, Default)]
pub struct ModelGateway {
    classification_scaler: Option<Arc<dyn Scaler>>,
    regression_scaler: Option<Arc<dyn Scaler>>,
    classifier: Option<Arc<dyn Classifier>>,
    regressor: Option<Arc<dyn Regressor>>,
    label_decoder: Option<Arc<dyn LabelDecoder>>,
}

impl ModelGateway {
    /// Gateway with nothing loaded
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_regressor(mut self, regressor: Arc<dyn Regressor>) -> Self {
        self.regressor = Some(regressor);
        self
    }

    pub fn with_classification_scaler(mut self, scaler: Arc<dyn Scaler>) -> Self {
        self.classification_scaler = Some(scaler);
        self
    }

    pub fn with_regression_scaler(mut self, scaler: Arc<dyn Scaler>) -> Self {
        self.regression_scaler = Some(scaler);
        self
    }

    pub fn with_label_decoder(mut self, decoder: Arc<dyn LabelDecoder>) -> Self {
        self.label_decoder = Some(decoder);
        self
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            classifier_loaded: self.classifier.is_some(),
            regressor_loaded: self.regressor.is_some(),
            scalers_loaded: self.classification_scaler.is_some()
                || self.regression_scaler.is_some(),
            label_decoder_loaded: self.label_decoder.is_some(),
        }
    }

    /// Scale (when a scaler is loaded) and classify.
    pub fn predict_classification(
        &self,
        features: &FeatureVector,
    ) -> Result<ClassifierOutput, PredictionError> {
        let classifier = self
            .classifier
            .as_ref()
            .ok_or(PredictionError::ModelUnavailable(ModelKind::Classification))?;

        let scaled = scale(self.classification_scaler.as_deref(), features)?;
        let probabilities = classifier.predict_proba(&scaled)?;
        let class_index = argmax(&probabilities)
            .ok_or_else(|| PredictionError::Backend("classifier returned no classes".to_string()))?;

        Ok(ClassifierOutput {
            class_index,
            probabilities,
        })
    }

    /// Scale (when a scaler is loaded) and regress.
    pub fn predict_regression(&self, features: &FeatureVector) -> Result<f64, PredictionError> {
        let regressor = self
            .regressor
            .as_ref()
            .ok_or(PredictionError::ModelUnavailable(ModelKind::Regression))?;

        let scaled = scale(self.regression_scaler.as_deref(), features)?;
        let value = regressor.predict(&scaled)?;
        if !value.is_finite() {
            return Err(PredictionError::Backend(format!(
                "regressor returned non-finite value {value}"
            )));
        }
        Ok(value)
    }

    /// Decode a class index; `None` when no decoder was loaded.
    pub fn decode_label(&self, class_index: usize) -> Option<Result<String, PredictionError>> {
        self.label_decoder
            .as_ref()
            .map(|decoder| decoder.inverse_transform(class_index))
    }
}

fn scale(scaler: Option<&dyn Scaler>, features: &FeatureVector) -> Result<Vec<f32>, PredictionError> {
    match scaler {
        Some(scaler) => scaler.transform(features.as_slice()),
        None => Ok(features.as_slice().to_vec()),
    }
}
