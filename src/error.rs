//! Error types for the relay

use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the relay
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Webhook signature did not match the channel secret
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// AI backend call failed
    #[error("upstream AI error: {0}")]
    UpstreamAi(String),

    /// Extractor output could not be decoded into event details
    #[error("malformed extraction result: {0}")]
    MalformedExtraction(String),

    /// Conversation store error
    #[error("store error: {0}")]
    Store(String),

    /// Messaging channel error
    #[error("channel error: {0}")]
    Channel(String),

    /// URL shortener error
    #[error("shortener error: {0}")]
    Shortener(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
