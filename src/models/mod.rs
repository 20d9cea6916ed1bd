//! Model artifact access: loading, preprocessing and inference

pub mod gateway;
pub mod loader;
pub mod onnx;
pub mod preprocess;

pub use gateway::{Classifier, ClassifierOutput, LabelDecoder, ModelGateway, Regressor, Scaler};
pub use loader::{load_baseline_accuracy, ModelLoader};
