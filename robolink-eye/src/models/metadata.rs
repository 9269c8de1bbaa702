//! Label descriptor of a classifier bundle (`metadata.json`)

use crate::error::VisionError;
use serde::{Deserialize, Serialize};

fn default_image_size() -> u32 {
    224
}

/// Teachable Machine style metadata. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    /// Class names in model output order
    pub labels: Vec<String>,
    /// Square input side in pixels
    #[serde(default = "default_image_size")]
    pub image_size: u32,
    #[serde(default)]
    pub model_name: Option<String>,
}

impl ModelMetadata {
    pub fn from_json(content: &str) -> Result<Self, VisionError> {
        let metadata: ModelMetadata = serde_json::from_str(content)
            .map_err(|e| VisionError::Model(format!("Invalid model metadata: {}", e)))?;
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn validate(&self) -> Result<(), VisionError> {
        if self.labels.is_empty() {
            return Err(VisionError::Model("Model metadata lists no labels".to_string()));
        }
        if self.labels.iter().any(|l| l.trim().is_empty()) {
            return Err(VisionError::Model("Model metadata contains an empty label".to_string()));
        }
        if self.image_size == 0 || self.image_size > 2048 {
            return Err(VisionError::Model(format!(
                "Unsupported image size {}",
                self.image_size
            )));
        }
        Ok(())
    }
}
