//! Error types for the key exchange core.
//!
//! Errors split into two groups. Fatal errors end a session's startup:
//! protocol-order violations and the handshake timeout. Recoverable errors
//! concern a single incoming message, which the caller discards before
//! carrying on with the next one.

use std::time::Duration;

use qlink_crypto::CipherError;
use qlink_proto::ProtocolError;
use thiserror::Error;

use crate::session::SessionState;

/// Errors that can occur during session and handshake operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Operation invoked out of protocol order
    #[error("state error: cannot {operation} in state {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: SessionState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// No basis reply arrived within the handshake bound
    #[error("key establishment timed out after {elapsed:?}")]
    KeyEstablishmentTimeout {
        /// How long we waited
        elapsed: Duration,
    },

    /// AEAD tag verification failed on decrypt
    #[error("authentication failure: {0}")]
    AuthFailure(String),

    /// Structurally invalid incoming message
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Sequence length does not match the session's qubit count
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Length the session was configured for
        expected: usize,
        /// Length received
        actual: usize,
    },
}

impl SessionError {
    /// Returns true if the offending message can be dropped and processing
    /// continued.
    ///
    /// State violations and timeouts are never recoverable: they mean the
    /// session has no usable key.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::AuthFailure(_) | Self::MalformedMessage(_) | Self::LengthMismatch { .. }
        )
    }
}

impl From<ProtocolError> for SessionError {
    fn from(err: ProtocolError) -> Self {
        Self::MalformedMessage(err.to_string())
    }
}

impl From<CipherError> for SessionError {
    fn from(err: CipherError) -> Self {
        match err {
            CipherError::AuthFailure { reason } => Self::AuthFailure(reason),
        }
    }
}
