//! Frame sources

mod directory;
#[cfg(feature = "camera")]
mod camera;

pub use directory::DirectorySource;
#[cfg(feature = "camera")]
pub use camera::CameraSource;

use crate::error::VisionError;
use robolink_core::{CaptureConfig, CaptureSource, Frame, FrameSource};

/// Open the frame source named by the capture configuration.
pub async fn open_source(config: &CaptureConfig) -> Result<Box<dyn FrameSource>, VisionError> {
    config.validate().map_err(VisionError::Config)?;

    match &config.source {
        CaptureSource::Directory { path } => {
            let source = DirectorySource::open(path, config.mirror).await?;
            Ok(Box::new(source))
        }
        #[cfg(feature = "camera")]
        CaptureSource::Camera { index } => {
            let source = CameraSource::open(*index, config)?;
            Ok(Box::new(source))
        }
        #[cfg(not(feature = "camera"))]
        CaptureSource::Camera { index } => Err(VisionError::Config(format!(
            "Camera {} requested but robolink was built without the `camera` feature; use a directory source instead",
            index
        ))),
    }
}

/// Mirror a frame horizontally when asked to
pub(crate) fn orient(frame: Frame, mirror: bool) -> Frame {
    if mirror {
        image::imageops::flip_horizontal(&frame)
    } else {
        frame
    }
}
