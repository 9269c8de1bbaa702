//! robolink-eye: Inference Source for robolink
//!
//! Wraps the externally supplied image classifier and the frame capture
//! device behind the `Classifier` and `FrameSource` seams of
//! robolink-core.
//!
//! - `models`: bundle fetching (model + label descriptor) and the ONNX classifier
//! - `capture`: image-directory replay and, with the `camera` feature, a webcam
//! - `preprocess`: frame to input tensor conversion

pub mod capture;
pub mod error;
pub mod models;
pub mod preprocess;

pub use capture::{open_source, DirectorySource};
#[cfg(feature = "camera")]
pub use capture::CameraSource;
pub use error::VisionError;
pub use models::{ModelBundle, ModelManager, ModelMetadata, OnnxClassifier};
