use thiserror::Error;

pub type Result<T> = std::result::Result<T, DhtError>;

#[derive(Error, Debug)]
pub enum DhtError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Address not found: {0}")]
    AddressNotFound(String),

    #[error("Network closed")]
    Closed,

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Insufficient replicas: {acked} of {required} acknowledged")]
    InsufficientReplicas { acked: usize, required: usize },

    #[error("Value not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for DhtError {
    fn from(err: std::io::Error) -> Self {
        DhtError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for DhtError {
    fn from(err: serde_json::Error) -> Self {
        DhtError::SerializationError(err.to_string())
    }
}
