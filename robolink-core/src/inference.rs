//! Seams between the driving loop and its external collaborators

use crate::classification::Classification;
use crate::error::Result;
use async_trait::async_trait;

/// One RGB video frame
pub type Frame = image::RgbImage;

/// Image classifier consumed through a load/predict contract.
#[async_trait]
pub trait Classifier: Send {
    /// Class names in model output order
    fn labels(&self) -> &[String];

    /// Classify a frame. The result may be unsorted; callers rank it.
    async fn predict(&mut self, frame: &Frame) -> Result<Vec<Classification>>;
}

/// Supplier of video frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Short description for logs
    fn describe(&self) -> String;

    /// Acquire the current frame.
    async fn next_frame(&mut self) -> Result<Frame>;
}
