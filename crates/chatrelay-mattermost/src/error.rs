//! Adapter error types.

use chatrelay_core::error::ConfigError;
use std::io;
use thiserror::Error;

/// Errors that can occur in the Mattermost adapter.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Login or transport initialization failed. Fatal at startup.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A channel name did not resolve to an id.
    #[error("Could not find channel ID for channel {0}")]
    ChannelNotFound(String),

    /// Posting through the webhook or the session failed.
    #[error("Send failed: {0}")]
    Send(String),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A system notification did not have the expected shape.
    #[error("Malformed notification: {0}")]
    MalformedTopic(String),

    /// The operation needs a transport this adapter was not configured with.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Adapter configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a channel-not-found error.
    pub fn channel_not_found(channel: impl Into<String>) -> Self {
        Self::ChannelNotFound(channel.into())
    }

    /// Create a send error.
    pub fn send(message: impl Into<String>) -> Self {
        Self::Send(message.into())
    }

    /// Create a not-supported error.
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported(message.into())
    }

    /// Check if this error is worth retrying by the caller.
    ///
    /// The adapter itself never retries.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Send(_) | Self::Io(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

impl From<ConfigError> for BridgeError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
