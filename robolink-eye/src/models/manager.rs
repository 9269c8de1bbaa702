//! Model bundle manager with download cache

use crate::error::VisionError;
use crate::models::metadata::ModelMetadata;
use robolink_core::ModelConfig;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_RESOURCE_SIZE: usize = 2_000_000_000; // 2GB max
const DOWNLOAD_TIMEOUT_SECS: u64 = 3600;
const MAX_URL_LENGTH: usize = 2048;

/// Anything smaller is treated as a truncated download
const MIN_MODEL_BYTES: usize = 1024;
const MIN_METADATA_BYTES: usize = 2;

/// A loaded classifier bundle ready for `OnnxClassifier::load`
#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub model_path: PathBuf,
    pub metadata: ModelMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BundleLocation {
    Remote(String),
    Local(PathBuf),
}

/// Resolves the configured model source into a local `ModelBundle`.
pub struct ModelManager {
    config: Arc<ModelConfig>,
}

impl ModelManager {
    pub fn new(config: Arc<ModelConfig>) -> Self {
        Self { config }
    }

    fn location(&self) -> Result<BundleLocation, VisionError> {
        let source = self.config.source.trim();
        if source.is_empty() {
            return Err(VisionError::Config("Model source is empty".to_string()));
        }
        if source.starts_with("https://") {
            if source.len() > MAX_URL_LENGTH {
                return Err(VisionError::Model("Invalid URL".to_string()));
            }
            return Ok(BundleLocation::Remote(source.trim_end_matches('/').to_string()));
        }
        if source.starts_with("http://") {
            return Err(VisionError::Model(
                "Only HTTPS URLs are allowed for model downloads".to_string(),
            ));
        }
        if let Some((scheme, _)) = source.split_once("://") {
            return Err(VisionError::Model(format!(
                "Unsupported model source scheme '{}'",
                scheme
            )));
        }
        Ok(BundleLocation::Local(PathBuf::from(source)))
    }

    /// Cache directory for a remote base URL. Each source gets its own
    /// subdirectory so bundles with identical file names do not collide.
    pub fn cache_dir_for(&self, base_url: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(base_url.as_bytes()));
        self.config.cache_dir.join(&digest[..16])
    }

    /// Ensure a cache directory exists
    pub fn ensure_cache_dir(&self, dir: &Path) -> Result<PathBuf, VisionError> {
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| {
                VisionError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create model cache directory: {}", e),
                ))
            })?;
            info!("Created model cache directory: {:?}", dir);
        }
        Ok(dir.to_path_buf())
    }

    /// Download `url` into `dir/name` unless a valid copy is already cached.
    pub async fn ensure_resource(
        &self,
        dir: &Path,
        name: &str,
        url: &str,
        checksum: Option<&str>,
        min_bytes: usize,
    ) -> Result<PathBuf, VisionError> {
        validate_resource_name(name)?;

        if url.is_empty() || url.len() > MAX_URL_LENGTH {
            return Err(VisionError::Model("Invalid URL".to_string()));
        }
        if !url.starts_with("https://") {
            return Err(VisionError::Model(
                "Only HTTPS URLs are allowed for model downloads".to_string(),
            ));
        }

        self.ensure_cache_dir(dir)?;
        let path = dir.join(name);
        if !path.starts_with(dir) {
            return Err(VisionError::Model("Path traversal detected".to_string()));
        }

        if path.exists() {
            match checksum {
                Some(expected) => {
                    let bytes = tokio::fs::read(&path).await?;
                    if verify_checksum(name, &bytes, expected).is_ok() {
                        debug!("Using cached {} at {:?}", name, path);
                        return Ok(path);
                    }
                    warn!("Cached {} failed checksum verification, downloading again", name);
                }
                None => {
                    debug!("Using cached {} at {:?}", name, path);
                    return Ok(path);
                }
            }
        }

        info!("Downloading {} from {}", name, url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()?;
        let response = client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(VisionError::Model(format!(
                "Failed to download {}: HTTP {}",
                name,
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_RESOURCE_SIZE as u64 {
                return Err(VisionError::Model(format!(
                    "{} too large: {} bytes (max {} bytes)",
                    name, content_length, MAX_RESOURCE_SIZE
                )));
            }
        }

        let bytes = response.bytes().await?;
        if bytes.len() > MAX_RESOURCE_SIZE {
            return Err(VisionError::Model(format!(
                "Downloaded {} too large: {} bytes (max {} bytes)",
                name,
                bytes.len(),
                MAX_RESOURCE_SIZE
            )));
        }
        if bytes.len() < min_bytes {
            return Err(VisionError::Model(format!(
                "Downloaded {} too small ({} bytes), likely corrupted",
                name,
                bytes.len()
            )));
        }

        match checksum {
            Some(expected) => {
                verify_checksum(name, &bytes, expected)?;
                info!("Verified checksum for {}", name);
            }
            None => info!("Downloaded {} bytes for {} (checksum verification skipped)", bytes.len(), name),
        }

        // write to a temp file first, then rename
        let temp_path = dir.join(format!("{}.part", name));
        tokio::fs::write(&temp_path, &bytes).await.map_err(|e| {
            VisionError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write {}: {}", name, e),
            ))
        })?;
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(VisionError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to rename {}: {}", name, e),
            )));
        }

        info!("Saved {} to {:?}", name, path);
        Ok(path)
    }

    /// Resolve the model file and label descriptor.
    pub async fn fetch(&self) -> Result<ModelBundle, VisionError> {
        validate_resource_name(&self.config.model_file)?;
        validate_resource_name(&self.config.metadata_file)?;
        let checksum = self.config.model_checksum.as_deref();

        let (model_path, metadata_path) = match self.location()? {
            BundleLocation::Remote(base) => {
                let dir = self.cache_dir_for(&base);
                let metadata_url = format!("{}/{}", base, self.config.metadata_file);
                let model_url = format!("{}/{}", base, self.config.model_file);
                let metadata_path = self
                    .ensure_resource(&dir, &self.config.metadata_file, &metadata_url, None, MIN_METADATA_BYTES)
                    .await?;
                let model_path = self
                    .ensure_resource(&dir, &self.config.model_file, &model_url, checksum, MIN_MODEL_BYTES)
                    .await?;
                (model_path, metadata_path)
            }
            BundleLocation::Local(dir) => {
                if !dir.is_dir() {
                    return Err(VisionError::Model(format!(
                        "Model directory {:?} does not exist",
                        dir
                    )));
                }
                let model_path = dir.join(&self.config.model_file);
                let metadata_path = dir.join(&self.config.metadata_file);
                for path in [&model_path, &metadata_path] {
                    if !path.is_file() {
                        return Err(VisionError::Model(format!("Missing bundle file {:?}", path)));
                    }
                }
                if let Some(expected) = checksum {
                    let bytes = tokio::fs::read(&model_path).await?;
                    verify_checksum(&self.config.model_file, &bytes, expected)?;
                }
                (model_path, metadata_path)
            }
        };

        let content = tokio::fs::read_to_string(&metadata_path).await?;
        let metadata = ModelMetadata::from_json(&content)?;
        info!(
            "Model bundle ready: {:?} ({} labels, input {}px)",
            model_path,
            metadata.labels.len(),
            metadata.image_size
        );

        Ok(ModelBundle { model_path, metadata })
    }
}

fn validate_resource_name(name: &str) -> Result<(), VisionError> {
    if name.is_empty() || name.len() > 255 {
        return Err(VisionError::Model("Invalid resource name".to_string()));
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(VisionError::Model(
            "Resource name contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

fn verify_checksum(name: &str, bytes: &[u8], expected: &str) -> Result<(), VisionError> {
    let computed = hex::encode(Sha256::digest(bytes));
    if !computed.eq_ignore_ascii_case(expected) {
        return Err(VisionError::Model(format!(
            "Checksum mismatch for {}: expected {}, got {}",
            name, expected, computed
        )));
    }
    Ok(())
}
