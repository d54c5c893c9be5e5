//! Error types for dataset publishing

use crate::types::ElementKind;
use thiserror::Error;

/// Main error type for registration and chunk serving
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Malformed chunk coordinate: {0}")]
    MalformedCoordinate(String),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Cannot encode {0} elements without an object codec")]
    UnencodableElementKind(ElementKind),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Invalid attribute {key:?}: {reason}")]
    InvalidAttribute { key: String, reason: String },

    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("Invalid codec configuration: {0}")]
    InvalidCodecConfig(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Invalid data type: {0}")]
    InvalidDataType(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl PublishError {
    /// Whether the error was caused by the request rather than the dataset
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PublishError::MalformedCoordinate(_)
                | PublishError::UnknownVariable(_)
                | PublishError::KeyNotFound(_)
        )
    }
}

/// Specialized Result type for publishing operations
pub type Result<T> = std::result::Result<T, PublishError>;

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Serialization(err.to_string())
    }
}
