//! Error types for envelope encryption.

use thiserror::Error;

/// Errors produced by the authenticated cipher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// Tag verification failed or the envelope is structurally invalid.
    ///
    /// No plaintext is ever returned alongside this error.
    #[error("authentication failed: {reason}")]
    AuthFailure {
        /// What went wrong
        reason: String,
    },
}

impl CipherError {
    pub(crate) fn auth(reason: impl Into<String>) -> Self {
        Self::AuthFailure { reason: reason.into() }
    }
}
