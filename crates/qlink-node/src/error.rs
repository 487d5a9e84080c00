//! Node error types.

use qlink_core::SessionError;
use qlink_proto::ProtocolError;
use thiserror::Error;

/// Errors that end a node run.
///
/// Per-message problems (bad JSON, failed tag checks) never surface here:
/// the runtimes log them and keep going. What remains is fatal for the run.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Key exchange failed, including the handshake timeout
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Outgoing message could not be encoded
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Broker rejected a publish or a subscription closed
    #[error("transport error: {0}")]
    Transport(String),

    /// Record log could not be written
    #[error("record log error: {0}")]
    RecordLog(#[from] std::io::Error),
}

impl NodeError {
    /// True if the run ended because no basis reply arrived in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Session(SessionError::KeyEstablishmentTimeout { .. }))
    }
}
