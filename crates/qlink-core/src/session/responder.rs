//! Responder side of the key exchange.

use super::{EstablishedKey, KeyAgreement, Role, SessionState, invalid_state};
use crate::{
    bits::{BasisSequence, BitSequence, MeasurementResult, SiftedKey},
    config::SessionConfig,
    env::Environment,
    error::SessionError,
    oracle::{CoinFlipOracle, MeasurementOracle},
};

/// Measures received qubits in random bases and sifts against the
/// initiator's bases.
#[derive(Debug)]
pub struct ResponderSession<E: Environment, O: MeasurementOracle = CoinFlipOracle<E>> {
    env: E,
    oracle: O,
    config: SessionConfig,
    state: SessionState,
    agreement: Option<KeyAgreement>,
}

impl<E: Environment> ResponderSession<E, CoinFlipOracle<E>> {
    /// Create a session measuring through a [`CoinFlipOracle`] on `env`.
    pub fn new(env: E, config: SessionConfig) -> Self {
        let oracle = CoinFlipOracle::new(env.clone());
        Self::with_oracle(env, oracle, config)
    }
}

impl<E: Environment, O: MeasurementOracle> ResponderSession<E, O> {
    /// Create a session with a custom measurement oracle.
    pub fn with_oracle(env: E, oracle: O, config: SessionConfig) -> Self {
        Self { env, oracle, config, state: SessionState::Uninitialized, agreement: None }
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

    /// Measure every received qubit in a freshly chosen random basis.
    ///
    /// Returns the measured bits and the bases used; the bases are what gets
    /// sent back to the initiator.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if qubits were already measured
    /// - `LengthMismatch` if `bits` or `bases` is not `num_bits` long
    pub fn measure(
        &mut self,
        bits: &BitSequence,
        bases: &BasisSequence,
    ) -> Result<(MeasurementResult, BasisSequence), SessionError> {
        if self.state != SessionState::Uninitialized {
            return Err(invalid_state(self.state, "measure"));
        }
        let expected = self.config.num_bits;
        for actual in [bits.len(), bases.len()] {
            if actual != expected {
                return Err(SessionError::LengthMismatch { expected, actual });
            }
        }

        let own_bases = BasisSequence::random(&self.env, expected);
        let measured: Vec<u8> = bits
            .as_slice()
            .iter()
            .zip(bases.as_slice())
            .zip(own_bases.as_slice())
            .map(|((&bit, &sent), &measured)| self.oracle.measure(bit, sent, measured))
            .collect();
        let measured = BitSequence::from_raw(&measured)?;

        self.agreement = Some(KeyAgreement::new(own_bases.clone(), measured.clone()));
        self.state = SessionState::Measured;

        tracing::debug!(num_bits = expected, "responder measured qubits");
        Ok((measured, own_bases))
    }

    /// Accept the initiator's preparation bases.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless in [`SessionState::Measured`]
    /// - `LengthMismatch` if the bases differ in length from the qubits
    pub fn receive_peer_bases(&mut self, peer_bases: BasisSequence) -> Result<(), SessionError> {
        if self.state != SessionState::Measured {
            return Err(invalid_state(self.state, "receive_peer_bases"));
        }
        let Some(agreement) = self.agreement.as_mut() else {
            return Err(invalid_state(self.state, "receive_peer_bases"));
        };

        agreement.accept_peer_bases(peer_bases)?;
        self.state = SessionState::BasesExchanged;
        Ok(())
    }

    /// Sift the measured bits and derive the session key.
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
            agreement.establish(self.state, Role::Responder, self.config.max_sifted_len)?;
        self.state = SessionState::KeyEstablished;
        Ok(established)
    }

    /// Accept the initiator's bases and establish the key in one step.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if called before [`measure`](Self::measure) or after
    ///   the key is established
    /// - `LengthMismatch` if the bases differ in length from the qubits
    pub fn finalize_key(&mut self, peer_bases: BasisSequence) -> Result<SiftedKey, SessionError> {
        self.receive_peer_bases(peer_bases)?;
        Ok(self.establish_key()?.sifted_key().clone())
    }

    /// Established key material. `None` until [`SessionState::KeyEstablished`].
    pub fn established(&self) -> Option<&EstablishedKey> {
        self.agreement.as_ref().and_then(|a| a.established.as_ref())
    }
}
