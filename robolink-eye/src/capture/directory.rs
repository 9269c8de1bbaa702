//! Replay of still images from a directory

use super::orient;
use crate::error::VisionError;
use async_trait::async_trait;
use robolink_core::{Frame, FrameSource};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Loops forever over the images of a directory in lexical order.
pub struct DirectorySource {
    root: PathBuf,
    files: Vec<PathBuf>,
    position: usize,
    mirror: bool,
}

impl DirectorySource {
    pub async fn open(root: impl AsRef<Path>, mirror: bool) -> Result<Self, VisionError> {
        let root = root.as_ref().to_path_buf();
        let mut entries = tokio::fs::read_dir(&root).await.map_err(|e| {
            VisionError::Camera(format!("Failed to open frame directory {:?}: {}", root, e))
        })?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_image && path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(VisionError::Camera(format!(
                "No images found in frame directory {:?}",
                root
            )));
        }

        info!("Replaying {} frames from {:?}", files.len(), root);
        Ok(Self {
            root,
            files,
            position: 0,
            mirror,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl FrameSource for DirectorySource {
    fn describe(&self) -> String {
        format!("directory {:?}", self.root)
    }

    async fn next_frame(&mut self) -> robolink_core::Result<Frame> {
        let path = &self.files[self.position];
        self.position = (self.position + 1) % self.files.len();

        debug!("Reading frame {:?}", path);
        let bytes = tokio::fs::read(path).await.map_err(VisionError::from)?;
        let frame = image::load_from_memory(&bytes)
            .map_err(VisionError::from)?
            .to_rgb8();
        Ok(orient(frame, self.mirror))
    }
}
