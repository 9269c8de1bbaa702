//! Error types for robolink-cns

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CnsError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] robolink_core::Error),
}

impl From<rumqttc::ClientError> for CnsError {
    fn from(err: rumqttc::ClientError) -> Self {
        CnsError::Publish(err.to_string())
    }
}
