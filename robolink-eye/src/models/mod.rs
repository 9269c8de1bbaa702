//! Classifier bundle management and inference

pub mod classifier;
pub mod manager;
pub mod metadata;

pub use classifier::OnnxClassifier;
pub use manager::{ModelBundle, ModelManager};
pub use metadata::ModelMetadata;
