//! Key exchange sessions.
//!
//! One session object per party and per key exchange. Sessions are pure:
//! they never touch the network and take every input as an argument. The
//! surrounding handshake layer moves messages between them.
//!
//! # State Machine
//!
//! ```text
//! ┌───────────────┐ generate  ┌───────────────┐
//! │ Uninitialized │──────────>│ BitsGenerated │──┐
//! └───────────────┘           └───────────────┘  │ receive_peer_bases
//!         │ measure           ┌───────────────┐  │   ┌────────────────┐ establish_key ┌────────────────┐
//!         └──────────────────>│   Measured    │──┴──>│ BasesExchanged │──────────────>│ KeyEstablished │
//!                             └───────────────┘      └────────────────┘               └────────────────┘
//! ```
//!
//! `finalize_key` runs `receive_peer_bases` and `establish_key` back to
//! back. Every operation invoked from the wrong state fails with
//! [`SessionError::InvalidState`] and leaves the session unchanged.

mod initiator;
mod responder;

pub use initiator::InitiatorSession;
use qlink_crypto::{KeyMaterial, SymmetricKey, derive_key};
pub use responder::ResponderSession;
use tracing::{info, warn};

use crate::{
    bits::{BasisSequence, BitSequence, SiftedKey},
    error::SessionError,
    sifting::{SiftStats, sift},
};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing generated or measured yet
    Uninitialized,
    /// Initiator: bits and bases generated, waiting for peer bases
    BitsGenerated,
    /// Responder: qubits measured, waiting for peer bases
    Measured,
    /// Peer bases accepted, sifting pending
    BasesExchanged,
    /// Sifted and symmetric keys available
    KeyEstablished,
}

/// Which side of the exchange a session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Prepares and sends qubits (the vehicle)
    Initiator,
    /// Measures qubits and replies with bases (the roadside unit)
    Responder,
}

/// Outcome of a completed key exchange.
#[derive(Debug, Clone)]
pub struct EstablishedKey {
    sifted: SiftedKey,
    key: SymmetricKey,
    stats: SiftStats,
}

impl EstablishedKey {
    /// Sifted bits both peers agree on.
    pub fn sifted_key(&self) -> &SiftedKey {
        &self.sifted
    }

    /// Session key derived from the sifted bits.
    pub fn symmetric_key(&self) -> &SymmetricKey {
        &self.key
    }

    /// Reconciliation summary.
    pub fn stats(&self) -> SiftStats {
        self.stats
    }

    /// True if no bits survived sifting.
    pub fn is_degenerate(&self) -> bool {
        self.stats.is_degenerate()
    }
}

/// Reconciliation state shared by both session types.
#[derive(Debug, Clone)]
struct KeyAgreement {
    own_bases: BasisSequence,
    source_bits: BitSequence,
    peer_bases: Option<BasisSequence>,
    established: Option<EstablishedKey>,
}

impl KeyAgreement {
    fn new(own_bases: BasisSequence, source_bits: BitSequence) -> Self {
        Self { own_bases, source_bits, peer_bases: None, established: None }
    }

    fn accept_peer_bases(&mut self, peer: BasisSequence) -> Result<(), SessionError> {
        if peer.len() != self.own_bases.len() {
            return Err(SessionError::LengthMismatch {
                expected: self.own_bases.len(),
                actual: peer.len(),
            });
        }
        self.peer_bases = Some(peer);
        Ok(())
    }

    /// Sift and derive. `state` is the owning session's state, reported if
    /// the peer bases are missing.
    fn establish(
        &mut self,
        state: SessionState,
        role: Role,
        max_len: usize,
    ) -> Result<&EstablishedKey, SessionError> {
        let Some(peer) = &self.peer_bases else {
            return Err(invalid_state(state, "establish_key without peer bases"));
        };

        let (sifted, stats) = sift(&self.own_bases, peer, &self.source_bits, max_len)?;
        let key = derive_key(KeyMaterial::Bits(sifted.bits()));

        info!(
            ?role,
            matching = stats.matching,
            total = stats.total,
            sifted_len = stats.kept,
            fingerprint = %key.fingerprint(),
            "key established"
        );
        if stats.is_degenerate() {
            warn!(?role, total = stats.total, "no matching bases: derived key is degenerate");
        }

        Ok(&*self.established.insert(EstablishedKey { sifted, key, stats }))
    }
}

fn invalid_state(state: SessionState, operation: &'static str) -> SessionError {
    SessionError::InvalidState { state, operation }
}
