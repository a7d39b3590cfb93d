//! Error types for the voice chat client

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice chat client
#[derive(Debug, Error)]
pub enum Error {
    /// Microphone unavailable or permission refused
    #[error("capture denied: {0}")]
    CaptureDenied(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// User-supplied tool schema is not a valid JSON document
    #[error("malformed tool schema: {0}")]
    ToolSchema(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Message store rejected an operation
    #[error("message store error: {0}")]
    Store(String),

    /// Settings could not be persisted
    #[error("settings error: {0}")]
    Settings(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
