use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid endpoint: {0}")]
    Endpoint(String),

    #[error("Invalid channel: {0}")]
    Channel(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Model error: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, Error>;
