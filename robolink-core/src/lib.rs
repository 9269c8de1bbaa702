//! robolink-core: shared data model for the vision-to-command bridge
//!
//! Provides:
//! - Classification results and label normalization
//! - Operator-facing status values and their watch channel
//! - Layered TOML configuration
//! - Broker endpoint and command channel parsing
//! - The `Classifier` / `FrameSource` seams the driving loop consumes

pub mod error;
pub mod label;
pub mod classification;
pub mod status;
pub mod endpoint;
pub mod channel;
pub mod config;
pub mod inference;

pub use error::{Error, Result};
pub use label::Label;
pub use classification::{Classification, rank_classifications, top_classification};
pub use status::{Status, StatusReporter};
pub use endpoint::{BrokerEndpoint, BrokerScheme};
pub use channel::ChannelName;
pub use config::{
    RobolinkConfig, BrokerConfig, GateConfig, ModelConfig, CaptureConfig, CaptureSource,
    SessionConfig, PayloadFormat, CommandRule, InputLayout, PixelRange,
};
pub use inference::{Frame, Classifier, FrameSource};
