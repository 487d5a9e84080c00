//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors from decoding or validating wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Incoming message is structurally invalid
    #[error("malformed {message} message: {reason}")]
    MalformedMessage {
        /// Which message type was being decoded
        message: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// Telemetry record could not be parsed
    #[error("invalid telemetry record: {0}")]
    InvalidRecord(String),

    /// Message could not be serialized
    #[error("encode failed: {0}")]
    Encode(String),
}

impl ProtocolError {
    pub(crate) fn malformed(message: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedMessage { message, reason: reason.into() }
    }
}
