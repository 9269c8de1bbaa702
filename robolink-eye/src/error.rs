//! Error types for robolink-eye

use robolink_core::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("ONNX Runtime error: {0}")]
    Ort(String),

    #[error("OpenCV error: {0}")]
    OpenCv(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<VisionError> for CoreError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::Core(inner) => inner,
            VisionError::Io(inner) => CoreError::Io(inner),
            VisionError::Camera(msg) | VisionError::OpenCv(msg) => CoreError::Capture(msg),
            VisionError::Model(msg) | VisionError::Config(msg) => CoreError::Model(msg),
            VisionError::Network(e) => CoreError::Model(format!("Network error: {}", e)),
            VisionError::Processing(msg) | VisionError::Ort(msg) => CoreError::Inference(msg),
            VisionError::Image(e) => CoreError::Inference(format!("Image error: {}", e)),
        }
    }
}

#[cfg(feature = "camera")]
impl From<opencv::Error> for VisionError {
    fn from(err: opencv::Error) -> Self {
        VisionError::OpenCv(err.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_error_display() {
        let err = VisionError::Camera("Test error".to_string());
        assert!(err.to_string().contains("Camera error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_vision_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let vision_err: VisionError = io_err.into();
        assert!(matches!(vision_err, VisionError::Io(_)));
    }

    #[test]
    fn test_vision_error_to_core_error() {
        let core_err: CoreError = VisionError::Camera("unplugged".to_string()).into();
        match core_err {
            CoreError::Capture(msg) => assert!(msg.contains("unplugged")),
            other => panic!("Expected Capture error, got {:?}", other),
        }

        let core_err: CoreError = VisionError::Ort("bad tensor".to_string()).into();
        assert!(matches!(core_err, CoreError::Inference(_)));

        let core_err: CoreError = VisionError::Model("no labels".to_string()).into();
        assert!(matches!(core_err, CoreError::Model(_)));
    }

    #[test]
    fn test_core_error_round_trip_is_unwrapped() {
        let vision_err: VisionError = CoreError::Inference("x".to_string()).into();
        let core_err: CoreError = vision_err.into();
        assert!(matches!(core_err, CoreError::Inference(_)));
    }
}
