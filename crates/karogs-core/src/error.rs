//! Unified error types for Karogs.

use thiserror::Error;

/// Result type alias using KarogsError.
pub type Result<T> = std::result::Result<T, KarogsError>;

#[derive(Error, Debug)]
pub enum KarogsError {
    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Channel errors
    #[error("Channel error: {0}")]
    Channel(String),

    // Subscriber storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KarogsError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn channel(msg: impl Into<String>) -> Self {
        Self::Channel(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// Why a single message could not be delivered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The recipient blocked the bot or otherwise forbade delivery (HTTP 403).
    /// Nothing will reach this chat until the user contacts the bot again.
    #[error("Delivery forbidden: {description}")]
    Forbidden { description: String },

    /// Network failures, rate limits and server errors. Worth trying again
    /// on a later run.
    #[error("Delivery failed: {0}")]
    Transient(String),
}

impl DeliveryError {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }
}
