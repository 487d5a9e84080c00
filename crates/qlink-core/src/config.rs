//! Session configuration.

use std::time::Duration;

/// Qubits exchanged per session.
pub const DEFAULT_NUM_BITS: usize = 256;

/// Upper bound on the sifted key length, in bits.
pub const DEFAULT_MAX_SIFTED_LEN: usize = 256;

/// Time the initiator waits for the basis reply.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Key exchange configuration shared by both roles.
///
/// Both peers must agree on `num_bits`. `max_sifted_len` only needs to match
/// for the derived keys to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Number of qubits (N) prepared and measured per session
    pub num_bits: usize,
    /// Sifted bits beyond this length are ignored
    pub max_sifted_len: usize,
    /// Bound on waiting for the peer's bases
    pub handshake_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            num_bits: DEFAULT_NUM_BITS,
            max_sifted_len: DEFAULT_MAX_SIFTED_LEN,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}
