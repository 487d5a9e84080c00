//! Initiator side of the key exchange.

use super::{EstablishedKey, KeyAgreement, Role, SessionState, invalid_state};
use crate::{
    bits::{BasisSequence, BitSequence, SiftedKey},
    config::SessionConfig,
    env::Environment,
    error::SessionError,
};

/// Prepares random bits in random bases and sifts against the responder's
/// bases.
#[derive(Debug)]
pub struct InitiatorSession<E: Environment> {
    env: E,
    config: SessionConfig,
    state: SessionState,
    agreement: Option<KeyAgreement>,
}

impl<E: Environment> InitiatorSession<E> {
    /// Create a session in [`SessionState::Uninitialized`].
    pub fn new(env: E, config: SessionConfig) -> Self {
        Self { env, config, state: SessionState::Uninitialized, agreement: None }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True once the symmetric key is available.
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::KeyEstablished
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Generate the raw bits and preparation bases.
    ///
    /// Runs once per session; the sequences are fixed afterwards.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if already generated
    pub fn generate(&mut self) -> Result<(BitSequence, BasisSequence), SessionError> {
        if self.state != SessionState::Uninitialized {
            return Err(invalid_state(self.state, "generate"));
        }

        let bits = BitSequence::random(&self.env, self.config.num_bits);
        let bases = BasisSequence::random(&self.env, self.config.num_bits);

        self.agreement = Some(KeyAgreement::new(bases.clone(), bits.clone()));
        self.state = SessionState::BitsGenerated;

        tracing::debug!(num_bits = self.config.num_bits, "initiator generated bits and bases");
        Ok((bits, bases))
    }

    /// Accept the responder's measurement bases.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if bits have not been generated, or bases were
    ///   already accepted
    /// - `LengthMismatch` if the peer sent a different number of bases
    pub fn receive_peer_bases(&mut self, peer_bases: BasisSequence) -> Result<(), SessionError> {
        if self.state != SessionState::BitsGenerated {
            return Err(invalid_state(self.state, "receive_peer_bases"));
        }
        let Some(agreement) = self.agreement.as_mut() else {
            return Err(invalid_state(self.state, "receive_peer_bases"));
        };

        agreement.accept_peer_bases(peer_bases)?;
        self.state = SessionState::BasesExchanged;
        Ok(())
    }

    /// Sift and derive the session key.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless in [`SessionState::BasesExchanged`]
    pub fn establish_key(&mut self) -> Result<&EstablishedKey, SessionError> {
        if self.state != SessionState::BasesExchanged {
            return Err(invalid_state(self.state, "establish_key"));
        }
        let Some(agreement) = self.agreement.as_mut() else {
            return Err(invalid_state(self.state, "establish_key"));
        };

        let established =
            agreement.establish(self.state, Role::Initiator, self.config.max_sifted_len)?;
        self.state = SessionState::KeyEstablished;
        Ok(established)
    }

    /// Accept the peer's bases and establish the key in one step.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if called before [`generate`](Self::generate) or
    ///   after the key is established
    /// - `LengthMismatch` if the peer sent a different number of bases
    pub fn finalize_key(&mut self, peer_bases: BasisSequence) -> Result<SiftedKey, SessionError> {
        self.receive_peer_bases(peer_bases)?;
        Ok(self.establish_key()?.sifted_key().clone())
    }

    /// Established key material. `None` until [`SessionState::KeyEstablished`].
    pub fn established(&self) -> Option<&EstablishedKey> {
        self.agreement.as_ref().and_then(|a| a.established.as_ref())
    }
}
