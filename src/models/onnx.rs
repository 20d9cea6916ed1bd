//! ONNX Runtime backed classifier and regressor

use crate::error::PredictionError;
use crate::models::gateway::{Classifier, Regressor};
use crate::models::loader::LoadedModel;
use ort::memory::Allocator;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::sync::Mutex;
use tracing::debug;

/// Run a session on one feature row and hand the outputs to `extract`.
fn run_session<T>(
    model: &Mutex<LoadedModel>,
    features: &[f32],
    extract: impl FnOnce(&ort::session::SessionOutputs, &LoadedModelMeta) -> Result<T, PredictionError>,
) -> Result<T, PredictionError> {
    // Prepare input tensor - shape [1, num_features]
    let shape = vec![1_i64, features.len() as i64];
    let input_tensor = Tensor::from_array((shape, features.to_vec()))?;

    let mut model = model
        .lock()
        .map_err(|e| PredictionError::Backend(format!("Lock error: {}", e)))?;
    let meta = LoadedModelMeta {
        name: model.name.clone(),
        output_name: model.output_name.clone(),
    };
    let input_name = model.input_name.clone();

    let outputs = model
        .session
        .run(ort::inputs![input_name.as_str() => input_tensor])?;

    extract(&outputs, &meta)
}

struct LoadedModelMeta {
    name: String,
    output_name: String,
}

/// Eligibility classifier exported from a tree/linear model.
///
/// Handles both tensor probability outputs and the `seq(map(int64, float))`
/// form some exporters emit.
pub struct OnnxClassifier {
    model: Mutex<LoadedModel>,
}

impl OnnxClassifier {
    pub fn new(model: LoadedModel) -> Self {
        Self {
            model: Mutex::new(model),
        }
    }
}

impl Classifier for OnnxClassifier {
    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f64>, PredictionError> {
        run_session(&self.model, features, |outputs, meta| {
            extract_probabilities(outputs, &meta.output_name, &meta.name)
        })
    }
}

/// EMI-amount regressor
pub struct OnnxRegressor {
    model: Mutex<LoadedModel>,
}

impl OnnxRegressor {
    pub fn new(model: LoadedModel) -> Self {
        Self {
            model: Mutex::new(model),
        }
    }
}

impl Regressor for OnnxRegressor {
    fn predict(&self, features: &[f32]) -> Result<f64, PredictionError> {
        run_session(&self.model, features, |outputs, meta| {
            let output = outputs.get(meta.output_name.as_str()).ok_or_else(|| {
                PredictionError::Backend(format!("output {} missing", meta.output_name))
            })?;
            let (_, data) = output.try_extract_tensor::<f32>()?;
            let value = data
                .first()
                .map(|&v| v as f64)
                .ok_or_else(|| PredictionError::Backend("empty regression output".to_string()))?;
            debug!(model = %meta.name, value = value, "Regression output");
            Ok(value)
        })
    }
}

/// Extract class probabilities from model output
fn extract_probabilities(
    outputs: &ort::session::SessionOutputs,
    output_name: &str,
    model_name: &str,
) -> Result<Vec<f64>, PredictionError> {
    if let Some(output) = outputs.get(output_name) {
        let dtype = output.dtype();

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let probs = probabilities_from_tensor(&shape, data);
            debug!(model = %model_name, classes = probs.len(), "Extracted from tensor");
            return Ok(probs);
        }

        if DynSequenceValueType::can_downcast(&dtype) {
            return extract_from_sequence_map(output, model_name);
        }
    }

    // Fallback: first non-label output that yields probabilities
    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }

        let dtype = output.dtype();

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let probs = probabilities_from_tensor(&shape, data);
            debug!(model = %model_name, output = %name, "Extracted from tensor (fallback)");
            return Ok(probs);
        }

        if DynSequenceValueType::can_downcast(&dtype) {
            if let Ok(probs) = extract_from_sequence_map(&output, model_name) {
                return Ok(probs);
            }
        }
    }

    Err(PredictionError::Backend(format!(
        "no probability output found for {}",
        model_name
    )))
}

/// Probabilities from seq(map(int64, float)), ordered by class id
fn extract_from_sequence_map(
    output: &ort::value::DynValue,
    model_name: &str,
) -> Result<Vec<f64>, PredictionError> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| PredictionError::Backend(format!("Failed to downcast to sequence: {}", e)))?;

    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;

    // batch size is always 1
    let map_value = maps
        .first()
        .ok_or_else(|| PredictionError::Backend("Empty sequence".to_string()))?;

    let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;
    let probs = probabilities_by_class(kv_pairs)?;

    debug!(model = %model_name, classes = probs.len(), "Extracted from seq(map)");
    Ok(probs)
}

/// Places each probability at its class id; ids missing from the map read as 0.
fn probabilities_by_class(pairs: Vec<(i64, f32)>) -> Result<Vec<f64>, PredictionError> {
    let mut probs: Vec<Option<f64>> = Vec::new();

    for (class_id, prob) in pairs {
        let index = usize::try_from(class_id)
            .map_err(|_| PredictionError::Backend(format!("negative class id {}", class_id)))?;
        if index >= probs.len() {
            probs.resize(index + 1, None);
        }
        if probs[index].replace(prob as f64).is_some() {
            return Err(PredictionError::Backend(format!(
                "duplicate class id {}",
                class_id
            )));
        }
    }

    Ok(probs.into_iter().map(|p| p.unwrap_or(0.0)).collect())
}

/// First row of a `[batch, classes]` tensor, or the whole `[classes]` tensor
fn probabilities_from_tensor(shape: &ort::tensor::Shape, data: &[f32]) -> Vec<f64> {
    let dims: Vec<i64> = shape.iter().copied().collect();

    let width = match dims.as_slice() {
        [_, classes] => *classes as usize,
        _ => data.len(),
    };

    data.iter().take(width).map(|&p| p as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_map_probabilities_follow_class_ids() {
        let probs = probabilities_by_class(vec![(2, 0.7), (0, 0.1), (1, 0.2)]).unwrap();
        assert_eq!(probs.len(), 3);
        assert!((probs[0] - 0.1).abs() < 1e-6);
        assert!((probs[1] - 0.2).abs() < 1e-6);
        assert!((probs[2] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_seq_map_gap_in_class_ids_keeps_positions() {
        // class 1 absent: class 2 must stay at index 2
        let probs = probabilities_by_class(vec![(0, 0.3), (2, 0.7)]).unwrap();
        assert_eq!(probs.len(), 3);
        assert_eq!(probs[1], 0.0);
        assert!((probs[2] - 0.7).abs() < 1e-6);
        assert_eq!(crate::models::gateway::argmax(&probs), Some(2));
    }

    #[test]
    fn test_seq_map_rejects_bad_class_ids() {
        assert!(matches!(
            probabilities_by_class(vec![(-1, 0.5), (0, 0.5)]),
            Err(PredictionError::Backend(_))
        ));
        assert!(matches!(
            probabilities_by_class(vec![(1, 0.5), (1, 0.5)]),
            Err(PredictionError::Backend(_))
        ));
    }
}
