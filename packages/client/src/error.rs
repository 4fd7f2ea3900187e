//! Error types for the Keyroom client.

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to establish the WebSocket connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// The transport failed after the connection was open
    #[error("Transport error: {0}")]
    Transport(String),

    /// Inbound frame is not a JSON array of tagged messages
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Channel setting key outside the known settings schema
    #[error("Unknown channel setting '{0}'")]
    UnknownChannelSetting(String),

    /// Channel setting value of the wrong kind for its key
    #[error("Channel setting '{key}' expects a {expected} value")]
    InvalidChannelSetting { key: String, expected: &'static str },

    /// Outbound command could not be serialized
    #[error("Failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),

    /// The engine task has exited; the handle can no longer be used
    #[error("Client engine is no longer running")]
    EngineStopped,
}
