//! Artifact loader: ONNX models, scalers, label decoder and evaluation metrics

use crate::config::{BaselineAccuracy, ModelsConfig};
use crate::models::gateway::ModelGateway;
use crate::models::onnx::{OnnxClassifier, OnnxRegressor};
use crate::models::preprocess::{ClassLabels, StandardScaler};
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Loaded ONNX model with metadata
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the model
    pub input_name: String,
    /// Output name for probabilities / predicted value
    pub output_name: String,
}

/// Loader for the artifact store
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
    /// Whether ONNX Runtime initialised; ONNX artifacts are skipped otherwise
    runtime_ready: bool,
}

impl ModelLoader {
    /// Create a new model loader with specified number of threads.
    ///
    /// A runtime initialisation failure is logged, not returned: the engine
    /// still starts and predictions report the models as unavailable.
    pub fn with_threads(onnx_threads: usize) -> Self {
        let runtime_ready = match ort::init().commit() {
            Ok(_) => {
                info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
                true
            }
            Err(e) => {
                error!(error = %e, "ONNX Runtime initialization failed, models disabled");
                false
            }
        };

        Self {
            onnx_threads,
            runtime_ready,
        }
    }

    /// Load a single ONNX model from file
    pub fn load_model<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<LoadedModel> {
        let path = path.as_ref();
        anyhow::ensure!(self.runtime_ready, "ONNX Runtime not initialized");

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.iter().find(|o| o.name.contains("variable")))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "output".to_string());

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session,
            input_name,
            output_name,
        })
    }

    /// Load every artifact that is present. Each one is independent: a missing
    /// or broken file only leaves its slot empty.
    pub fn load_gateway(&self, config: &ModelsConfig) -> ModelGateway {
        let mut gateway = ModelGateway::empty();

        if let Some(model) = load_optional("classifier", &config.path_of(&config.classifier_file), |p| {
            self.load_model(p, "classification")
        }) {
            gateway = gateway.with_classifier(Arc::new(OnnxClassifier::new(model)));
        }

        if let Some(model) = load_optional("regressor", &config.path_of(&config.regressor_file), |p| {
            self.load_model(p, "regression")
        }) {
            gateway = gateway.with_regressor(Arc::new(OnnxRegressor::new(model)));
        }

        if let Some(scaler) = load_optional(
            "classification scaler",
            &config.path_of(&config.classification_scaler_file),
            |p| StandardScaler::from_file(p),
        ) {
            gateway = gateway.with_classification_scaler(Arc::new(scaler));
        }

        if let Some(scaler) = load_optional(
            "regression scaler",
            &config.path_of(&config.regression_scaler_file),
            |p| StandardScaler::from_file(p),
        ) {
            gateway = gateway.with_regression_scaler(Arc::new(scaler));
        }

        if let Some(labels) = load_optional(
            "label decoder",
            &config.path_of(&config.label_decoder_file),
            |p| ClassLabels::from_file(p),
        ) {
            gateway = gateway.with_label_decoder(Arc::new(labels));
        }

        let status = gateway.status();
        info!(
            classifier = status.classifier_loaded,
            regressor = status.regressor_loaded,
            scalers = status.scalers_loaded,
            label_decoder = status.label_decoder_loaded,
            "Artifact loading complete from {}",
            config.models_dir
        );

        gateway
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::with_threads(1)
    }
}

fn load_optional<T>(
    artifact: &str,
    path: &Path,
    load: impl FnOnce(&Path) -> Result<T>,
) -> Option<T> {
    if !path.exists() {
        warn!(artifact = %artifact, path = %path.display(), "Artifact file not found");
        return None;
    }

    match load(path) {
        Ok(value) => {
            info!(artifact = %artifact, "Artifact loaded");
            Some(value)
        }
        Err(e) => {
            warn!(artifact = %artifact, error = %e, "Failed to load artifact, skipping");
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct EvaluationData {
    #[serde(default)]
    classification_metrics: Vec<ClassificationMetric>,
    #[serde(default)]
    regression_metrics: Vec<RegressionMetric>,
}

#[derive(Debug, Deserialize)]
struct ClassificationMetric {
    #[serde(rename = "Model")]
    model: String,
    #[serde(rename = "Accuracy")]
    accuracy: f64,
}

#[derive(Debug, Deserialize)]
struct RegressionMetric {
    #[serde(rename = "Model")]
    model: String,
    #[serde(rename = "R² Score")]
    r2_score: f64,
}

/// Baseline accuracy from the offline evaluation file, falling back to
/// `fallback` for whatever the file does not provide.
pub fn load_baseline_accuracy(config: &ModelsConfig, fallback: BaselineAccuracy) -> BaselineAccuracy {
    let path = config.path_of(&config.evaluation_file);
    load_optional("evaluation metrics", &path, |p| {
        let raw = std::fs::read_to_string(p)?;
        let data: EvaluationData = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse evaluation data {:?}", p))?;
        Ok(baseline_from_evaluation(&data, fallback))
    })
    .unwrap_or(fallback)
}

fn baseline_from_evaluation(data: &EvaluationData, fallback: BaselineAccuracy) -> BaselineAccuracy {
    let classification = data
        .classification_metrics
        .iter()
        .find(|m| m.model == "EMI Eligibility")
        .map(|m| m.accuracy)
        .unwrap_or(fallback.classification);

    let regression = data
        .regression_metrics
        .iter()
        .find(|m| m.model == "Best Regression")
        .map(|m| m.r2_score)
        .unwrap_or(fallback.regression);

    BaselineAccuracy {
        classification,
        regression,
    }
}
