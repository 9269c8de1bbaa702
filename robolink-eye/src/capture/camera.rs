//! USB webcam capture

use super::orient;
use crate::error::VisionError;
use async_trait::async_trait;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
};
use parking_lot::Mutex;
use robolink_core::{CaptureConfig, Frame, FrameSource};
use std::sync::Arc;
use tracing::info;

/// Webcam opened through OpenCV
pub struct CameraSource {
    index: u32,
    capture: Arc<Mutex<VideoCapture>>,
    mirror: bool,
}

impl CameraSource {
    pub fn open(index: u32, config: &CaptureConfig) -> Result<Self, VisionError> {
        let mut capture = VideoCapture::new(index as i32, CAP_ANY)
            .map_err(|e| VisionError::Camera(format!("Failed to open camera {}: {}", index, e)))?;

        if !capture.is_opened()? {
            return Err(VisionError::Camera(format!("Camera {} failed to open", index)));
        }

        let (width, height) = config.resolution;
        capture
            .set(CAP_PROP_FRAME_WIDTH, width as f64)
            .map_err(|e| VisionError::Camera(format!("Failed to set width: {}", e)))?;
        capture
            .set(CAP_PROP_FRAME_HEIGHT, height as f64)
            .map_err(|e| VisionError::Camera(format!("Failed to set height: {}", e)))?;
        capture
            .set(CAP_PROP_FPS, config.frame_rate as f64)
            .map_err(|e| VisionError::Camera(format!("Failed to set FPS: {}", e)))?;

        info!(
            "Camera {} initialized at {}x{} @ {}fps",
            index, width, height, config.frame_rate
        );

        Ok(Self {
            index,
            capture: Arc::new(Mutex::new(capture)),
            mirror: config.mirror,
        })
    }
}

fn read_frame(capture: &Mutex<VideoCapture>) -> Result<Frame, VisionError> {
    let mut bgr = Mat::default();
    if !capture.lock().read(&mut bgr)? || bgr.empty() {
        return Err(VisionError::Camera("Camera returned no frame".to_string()));
    }

    let mut rgb = Mat::default();
    imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

    let width = rgb.cols() as u32;
    let height = rgb.rows() as u32;
    let bytes = rgb.data_bytes()?.to_vec();
    Frame::from_raw(width, height, bytes)
        .ok_or_else(|| VisionError::Processing("Frame buffer size mismatch".to_string()))
}

#[async_trait]
impl FrameSource for CameraSource {
    fn describe(&self) -> String {
        format!("camera {}", self.index)
    }

    async fn next_frame(&mut self) -> robolink_core::Result<Frame> {
        let capture = Arc::clone(&self.capture);
        let frame = tokio::task::spawn_blocking(move || read_frame(&capture))
            .await
            .map_err(|e| VisionError::Camera(format!("Capture task failed: {}", e)))??;
        Ok(orient(frame, self.mirror))
    }
}
