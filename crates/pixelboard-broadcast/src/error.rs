//! Error types for the broadcast layer.

/// Errors from the fan-out hub and pub/sub bridge.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    /// The hub task has stopped and can no longer accept events.
    #[error("broadcast hub is not running")]
    HubClosed,

    /// A pub/sub operation against the broker failed.
    #[error("pub/sub error: {0}")]
    Redis(#[from] fred::error::Error),

    /// A channel message did not decode as a draw event.
    #[error("malformed draw event: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A configuration error (bad URL, etc.).
    #[error("broadcast configuration error: {0}")]
    Config(String),
}
