//! JSON-backed preprocessing artifacts: standard scaler and label decoder

use crate::error::PredictionError;
use crate::models::gateway::{LabelDecoder, Scaler};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// `(x - mean) / scale`, per feature
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        anyhow::ensure!(
            mean.len() == scale.len(),
            "scaler mean has {} entries but scale has {}",
            mean.len(),
            scale.len()
        );
        Ok(Self { mean, scale })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scaler from {:?}", path))?;
        let parsed: StandardScaler = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse scaler {:?}", path))?;
        Self::new(parsed.mean, parsed.scale)
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }
}

impl Scaler for StandardScaler {
    fn transform(&self, features: &[f32]) -> Result<Vec<f32>, PredictionError> {
        if features.len() != self.width() {
            return Err(PredictionError::Backend(format!(
                "scaler expects {} features, got {}",
                self.width(),
                features.len()
            )));
        }

        Ok(features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&x, (&mean, &scale))| {
                // constant columns are stored with scale 0
                let scale = if scale == 0.0 { 1.0 } else { scale };
                ((x as f64 - mean) / scale) as f32
            })
            .collect())
    }
}

/// Class-index to label lookup, in training order
#[derive(Debug, Clone, Deserialize)]
pub struct ClassLabels {
    classes: Vec<String>,
}

impl ClassLabels {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read label decoder from {:?}", path))?;
        let labels: ClassLabels = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse label decoder {:?}", path))?;
        anyhow::ensure!(!labels.classes.is_empty(), "label decoder has no classes");
        Ok(labels)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

impl LabelDecoder for ClassLabels {
    fn inverse_transform(&self, class_index: usize) -> Result<String, PredictionError> {
        self.classes.get(class_index).cloned().ok_or_else(|| {
            PredictionError::Backend(format!(
                "class index {} outside decoder vocabulary of {}",
                class_index,
                self.classes.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_standard_scaling() {
        let scaler = StandardScaler::new(vec![10.0, 0.0, 5.0], vec![2.0, 1.0, 0.0]).unwrap();
        let out = scaler.transform(&[14.0, -3.0, 7.0]).unwrap();
        assert_eq!(out, vec![2.0, -3.0, 2.0]);
    }

    #[test]
    fn test_scaler_width_mismatch() {
        let scaler = StandardScaler::new(vec![0.0; 3], vec![1.0; 3]).unwrap();
        let err = scaler.transform(&[1.0; 65]).unwrap_err();
        assert!(matches!(err, PredictionError::Backend(_)));
        assert!(StandardScaler::new(vec![0.0; 2], vec![1.0; 3]).is_err());
    }

    #[test]
    fn test_scaler_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"mean": [1.0, 2.0], "scale": [0.5, 4.0]}}"#).unwrap();

        let scaler = StandardScaler::from_file(file.path()).unwrap();
        assert_eq!(scaler.width(), 2);
        assert_eq!(scaler.transform(&[2.0, 10.0]).unwrap(), vec![2.0, 2.0]);
    }

    #[test]
    fn test_label_decoding() {
        let labels = ClassLabels::new(vec![
            "Eligible".to_string(),
            "High_Risk".to_string(),
            "Not_Eligible".to_string(),
        ]);
        assert_eq!(labels.inverse_transform(1).unwrap(), "High_Risk");
        assert!(labels.inverse_transform(3).is_err());
    }

    #[test]
    fn test_empty_label_file_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"classes": []}}"#).unwrap();
        assert!(ClassLabels::from_file(file.path()).is_err());
    }
}
