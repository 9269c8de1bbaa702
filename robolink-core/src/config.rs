//! Layered configuration for robolink
//!
//! Every section carries `#[serde(default)]`, so a TOML file only needs the
//! keys it wants to change. Environment variables override the file, CLI
//! flags override both (applied by the binary).

use crate::channel::ChannelName;
use crate::endpoint::BrokerEndpoint;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// How the gate renders a label into an outbound payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadFormat {
    /// Single-letter robot command looked up through `commands`
    Command,
    /// The normalized uppercase label itself
    RawLabel,
    /// `LABEL (0.987)`
    LabelWithConfidence,
}

impl FromStr for PayloadFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "command" => Ok(PayloadFormat::Command),
            "raw-label" | "raw" => Ok(PayloadFormat::RawLabel),
            "label-with-confidence" | "verbose" => Ok(PayloadFormat::LabelWithConfidence),
            other => Err(format!(
                "unknown payload format '{}' (expected command, raw-label or label-with-confidence)",
                other
            )),
        }
    }
}

/// Maps labels containing `pattern` (case-insensitive) to `command`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRule {
    pub pattern: String,
    pub command: String,
}

impl CommandRule {
    pub fn new(pattern: &str, command: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            command: command.to_string(),
        }
    }
}

/// Tensor layout expected by the classifier input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputLayout {
    /// `[1, H, W, 3]` (Keras / Teachable Machine exports)
    Nhwc,
    /// `[1, 3, H, W]` (PyTorch exports)
    Nchw,
}

/// Pixel normalization applied before inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PixelRange {
    /// `p / 127.5 - 1`, range `[-1, 1]`
    SignedUnit,
    /// `p / 255`, range `[0, 1]`
    Unit,
}

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaptureSource {
    /// Webcam by device index (requires the `camera` feature of robolink-eye)
    Camera { index: u32 },
    /// Replay still images from a directory, looping
    Directory { path: PathBuf },
}

/// Broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker URL, e.g. `wss://test.mosquitto.org:8081/mqtt`
    pub url: String,
    /// Client identifier prefix; a random suffix is appended per session
    pub client_id_prefix: String,
    /// First topic segment
    pub namespace: String,
    /// Receiving device identifier, agreed out-of-band with the device firmware
    pub device_id: String,
    /// Topic template, `{namespace}` and `{device_id}` are substituted
    pub topic_template: String,
    /// Fixed retry interval after link loss, in milliseconds
    pub reconnect_period_ms: u64,
    /// MQTT keep-alive in seconds
    pub keep_alive_secs: u64,
    /// Capacity of the outgoing request queue of the MQTT client
    pub request_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "wss://test.mosquitto.org:8081/mqtt".to_string(),
            client_id_prefix: "tm-client".to_string(),
            namespace: "rc".to_string(),
            device_id: "robotcar_umk1".to_string(),
            topic_template: "{namespace}/{device_id}/cmd".to_string(),
            reconnect_period_ms: 2000,
            keep_alive_secs: 30,
            request_capacity: 16,
        }
    }
}

impl BrokerConfig {
    pub fn endpoint(&self) -> Result<BrokerEndpoint> {
        BrokerEndpoint::parse(&self.url)
    }

    pub fn channel(&self) -> Result<ChannelName> {
        ChannelName::render(&self.topic_template, &self.namespace, &self.device_id)
    }

    pub fn reconnect_period(&self) -> Duration {
        Duration::from_millis(self.reconnect_period_ms)
    }

    /// Validate configuration.
    ///
    /// The URL is not checked here; a malformed URL surfaces as a link
    /// error once the session connects.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.client_id_prefix.is_empty() || self.client_id_prefix.len() > 14 {
            return Err("Client id prefix must be 1 to 14 characters".to_string());
        }
        self.channel().map_err(|e| e.to_string())?;
        if self.reconnect_period_ms == 0 {
            return Err("Reconnect period must be greater than 0".to_string());
        }
        if self.keep_alive_secs < 5 {
            return Err("Keep-alive must be at least 5 seconds".to_string());
        }
        if self.request_capacity == 0 {
            return Err("Request capacity must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Publish gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Heartbeat interval: an unchanged label is re-sent once this has elapsed
    pub interval_ms: u64,
    pub payload_format: PayloadFormat,
    /// Ordered label-to-command rules, first match wins
    pub commands: Vec<CommandRule>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            payload_format: PayloadFormat::Command,
            commands: vec![
                CommandRule::new("forward", "F"),
                CommandRule::new("back", "B"),
                CommandRule::new("left", "L"),
                CommandRule::new("right", "R"),
                CommandRule::new("stop", "S"),
            ],
        }
    }
}

impl GateConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.interval_ms == 0 {
            return Err("Gate interval must be greater than 0".to_string());
        }
        if self.payload_format == PayloadFormat::Command && self.commands.is_empty() {
            return Err("Command payload format needs at least one command rule".to_string());
        }
        for rule in &self.commands {
            if rule.pattern.trim().is_empty() {
                return Err("Command rule pattern must not be empty".to_string());
            }
            if rule.command.trim().is_empty() {
                return Err(format!("Command for pattern '{}' must not be empty", rule.pattern));
            }
        }
        Ok(())
    }
}

/// Classifier bundle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// `https://` base URL or a local directory holding the bundle
    pub source: String,
    /// Model file name inside `source`
    pub model_file: String,
    /// Label descriptor file name inside `source`
    pub metadata_file: String,
    /// Download cache for `https://` sources
    pub cache_dir: PathBuf,
    /// Optional SHA-256 (hex) of the model file
    pub model_checksum: Option<String>,
    pub input_layout: InputLayout,
    pub pixel_range: PixelRange,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let cache_dir = dirs::home_dir()
            .map(|mut p| {
                p.push(".robolink");
                p.push("models");
                p
            })
            .unwrap_or_else(|| PathBuf::from("./models"));

        Self {
            source: "./model".to_string(),
            model_file: "model.onnx".to_string(),
            metadata_file: "metadata.json".to_string(),
            cache_dir,
            model_checksum: None,
            input_layout: InputLayout::Nhwc,
            pixel_range: PixelRange::SignedUnit,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.source.trim().is_empty() {
            return Err("Model source must not be empty".to_string());
        }
        if self.model_file.is_empty() || self.metadata_file.is_empty() {
            return Err("Model and metadata file names must not be empty".to_string());
        }
        if let Some(checksum) = &self.model_checksum {
            if checksum.len() != 64 || !checksum.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err("Model checksum must be 64 hex characters (SHA-256)".to_string());
            }
        }
        Ok(())
    }
}

/// Frame capture settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capture resolution (width, height)
    pub resolution: (u32, u32),
    /// Capture frame rate (frames per second)
    pub frame_rate: u32,
    /// Flip frames horizontally (selfie view)
    pub mirror: bool,
    pub source: CaptureSource,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            resolution: (320, 240),
            frame_rate: 30,
            mirror: true,
            source: CaptureSource::Camera { index: 0 },
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.frame_rate == 0 || self.frame_rate > 120 {
            return Err("Frame rate must be between 1 and 120".to_string());
        }

        if self.resolution.0 == 0 || self.resolution.1 == 0 {
            return Err("Resolution must be non-zero".to_string());
        }

        if self.resolution.0 > 7680 || self.resolution.1 > 4320 {
            return Err("Resolution too large (max 8K)".to_string());
        }

        match &self.source {
            CaptureSource::Camera { index } if *index > 100 => {
                Err("Camera index too large (max 100)".to_string())
            }
            CaptureSource::Directory { path } if path.as_os_str().is_empty() => {
                Err("Frame directory must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Driving loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Loop iterations per second
    pub tick_rate_hz: u32,
    /// Upper bound for one prediction; 0 disables the bound
    pub inference_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 30,
            inference_timeout_ms: 2000,
        }
    }
}

impl SessionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz.max(1) as f64)
    }

    pub fn inference_timeout(&self) -> Option<Duration> {
        if self.inference_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.inference_timeout_ms))
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.tick_rate_hz == 0 || self.tick_rate_hz > 240 {
            return Err("Tick rate must be between 1 and 240".to_string());
        }
        Ok(())
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RobolinkConfig {
    pub broker: BrokerConfig,
    pub gate: GateConfig,
    pub model: ModelConfig,
    pub capture: CaptureConfig,
    pub session: SessionConfig,
}

impl RobolinkConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Apply `ROBOLINK_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("ROBOLINK_BROKER_URL") {
            self.broker.url = url;
        }
        if let Some(device_id) = lookup("ROBOLINK_DEVICE_ID") {
            self.broker.device_id = device_id;
        }
        if let Some(source) = lookup("ROBOLINK_MODEL_SOURCE") {
            self.model.source = source;
        }
        if let Some(interval) = lookup("ROBOLINK_GATE_INTERVAL_MS") {
            match interval.parse::<u64>() {
                Ok(ms) => self.gate.interval_ms = ms,
                Err(_) => tracing::warn!("Ignoring invalid ROBOLINK_GATE_INTERVAL_MS '{}'", interval),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.broker.validate().map_err(|e| format!("broker: {}", e))?;
        self.gate.validate().map_err(|e| format!("gate: {}", e))?;
        self.model.validate().map_err(|e| format!("model: {}", e))?;
        self.capture.validate().map_err(|e| format!("capture: {}", e))?;
        self.session.validate().map_err(|e| format!("session: {}", e))?;
        Ok(())
    }
}
