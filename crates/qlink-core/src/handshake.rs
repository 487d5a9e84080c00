//! Handshake state machines.
//!
//! Wraps the sessions with message handling and timeout tracking. Uses the
//! action pattern: handlers take a parsed message (and time, where it
//! matters) and return actions for the driver to execute. No transport is
//! involved, so the full two-round handshake runs in plain unit tests.
//!
//! ```text
//! Initiator                                    Responder
//!   start ──── SendQubits(QubitTransfer) ────────> handle_qubit_transfer
//!                                                    measure + sift
//!   handle_basis_reply <── SendBases(BasisReply) ──
//!   sift
//!   channel.seal ──── EncryptedData ─────────────> handle_encrypted_data
//!                                                    Deliver | Drop
//! ```
//!
//! The initiator enforces the handshake bound: once `handshake_timeout` has
//! elapsed without a reply, [`InitiatorHandshake::check_timeout`] fails with
//! [`SessionError::KeyEstablishmentTimeout`] and the handshake is closed for
//! good. A closed handshake never yields a channel.

use std::{sync::Arc, time::Duration};

use qlink_proto::{BasisReply, EncryptedData, QubitTransfer};
use tracing::{debug, info, warn};

use crate::{
    bits::{BasisSequence, BitSequence},
    channel::SecureChannel,
    config::SessionConfig,
    env::Environment,
    error::SessionError,
    oracle::{CoinFlipOracle, MeasurementOracle},
    session::{InitiatorSession, ResponderSession},
};

/// Actions returned by the initiator handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitiatorAction {
    /// Publish the prepared qubits to the responder
    SendQubits(QubitTransfer),
}

/// Actions returned by the responder handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderAction {
    /// Publish our measurement bases to the initiator
    SendBases(BasisReply),

    /// Hand a decrypted record to the application
    Deliver(Vec<u8>),

    /// Discard an incoming message and keep going
    Drop {
        /// Why the message was discarded
        reason: String,
    },
}

/// Initiator handshake phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Not started
    Idle,
    /// Qubits sent, waiting for the basis reply
    AwaitingBases,
    /// Key established, channel available
    Established,
    /// Timed out; terminal
    TimedOut,
}

/// Initiator side: sends qubits, waits (bounded) for bases, derives the key.
pub struct InitiatorHandshake<E: Environment> {
    env: E,
    session: InitiatorSession<E>,
    phase: HandshakePhase,
    started_at: Option<E::Instant>,
    channel: Option<Arc<SecureChannel<E>>>,
}

impl<E: Environment> InitiatorHandshake<E> {
    /// Create an idle handshake.
    pub fn new(env: E, config: SessionConfig) -> Self {
        let session = InitiatorSession::new(env.clone(), config);
        Self { env, session, phase: HandshakePhase::Idle, started_at: None, channel: None }
    }

    /// Current phase.
    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    /// True once the channel is available.
    pub fn is_ready(&self) -> bool {
        self.phase == HandshakePhase::Established
    }

    /// Underlying session.
    pub fn session(&self) -> &InitiatorSession<E> {
        &self.session
    }

    /// Established channel. `None` until [`HandshakePhase::Established`].
    pub fn channel(&self) -> Option<Arc<SecureChannel<E>>> {
        self.channel.clone()
    }

    /// Generate qubits and start the handshake clock.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if already started
    pub fn start(&mut self, now: E::Instant) -> Result<Vec<InitiatorAction>, SessionError> {
        let (bits, bases) = self.session.generate()?;

        self.started_at = Some(now);
        self.phase = HandshakePhase::AwaitingBases;

        info!(num_bits = bits.len(), "initiator sending qubits");
        Ok(vec![InitiatorAction::SendQubits(QubitTransfer {
            bits: bits.to_vec(),
            bases: bases.to_vec(),
        })])
    }

    /// Time left before the handshake times out. `None` unless waiting.
    pub fn remaining(&self, now: E::Instant) -> Option<Duration> {
        match (self.phase, self.started_at) {
            (HandshakePhase::AwaitingBases, Some(started)) => {
                Some(self.session.config().handshake_timeout.saturating_sub(now - started))
            },
            _ => None,
        }
    }

    /// Fail the handshake if the reply is overdue.
    ///
    /// # Errors
    ///
    /// - `KeyEstablishmentTimeout` once `handshake_timeout` has elapsed
    ///   while waiting, and on every call after that
    pub fn check_timeout(&mut self, now: E::Instant) -> Result<(), SessionError> {
        let Some(started) = self.started_at else {
            return Ok(());
        };
        let elapsed = now - started;
        let timeout = self.session.config().handshake_timeout;

        match self.phase {
            HandshakePhase::AwaitingBases if elapsed >= timeout => {
                self.phase = HandshakePhase::TimedOut;
                warn!(?elapsed, "no basis reply, aborting key establishment");
                Err(SessionError::KeyEstablishmentTimeout { elapsed })
            },
            HandshakePhase::TimedOut => Err(SessionError::KeyEstablishmentTimeout { elapsed }),
            _ => Ok(()),
        }
    }

    /// Process the responder's basis reply.
    ///
    /// # Errors
    ///
    /// - `KeyEstablishmentTimeout` if the reply arrived after the bound
    /// - `InvalidState` if not waiting for a reply
    /// - `MalformedMessage` / `LengthMismatch` for a bad reply; the
    ///   handshake keeps waiting for a valid one
    pub fn handle_basis_reply(
        &mut self,
        reply: &BasisReply,
        now: E::Instant,
    ) -> Result<Arc<SecureChannel<E>>, SessionError> {
        self.check_timeout(now)?;

        let peer_bases = BasisSequence::from_raw(&reply.bases)?;
        self.session.finalize_key(peer_bases)?;

        let Some(established) = self.session.established() else {
            return Err(SessionError::InvalidState {
                state: self.session.state(),
                operation: "open channel",
            });
        };

        let channel = Arc::new(SecureChannel::new(self.env.clone(), established));
        self.channel = Some(Arc::clone(&channel));
        self.phase = HandshakePhase::Established;

        Ok(channel)
    }

    /// Decode and process a raw basis reply payload.
    ///
    /// # Errors
    ///
    /// See [`handle_basis_reply`](Self::handle_basis_reply).
    pub fn handle_basis_payload(
        &mut self,
        payload: &[u8],
        now: E::Instant,
    ) -> Result<Arc<SecureChannel<E>>, SessionError> {
        let reply = BasisReply::decode(payload)?;
        self.handle_basis_reply(&reply, now)
    }
}

/// Responder side: measures qubits on arrival, replies with bases, then
/// decrypts incoming records.
pub struct ResponderHandshake<E: Environment, O: MeasurementOracle = CoinFlipOracle<E>> {
    env: E,
    session: ResponderSession<E, O>,
    channel: Option<Arc<SecureChannel<E>>>,
}

impl<E: Environment> ResponderHandshake<E, CoinFlipOracle<E>> {
    /// Create a responder measuring through a [`CoinFlipOracle`].
    pub fn new(env: E, config: SessionConfig) -> Self {
        let session = ResponderSession::new(env.clone(), config);
        Self { env, session, channel: None }
    }
}

impl<E: Environment, O: MeasurementOracle> ResponderHandshake<E, O> {
    /// Create a responder with a custom measurement oracle.
    pub fn with_oracle(env: E, oracle: O, config: SessionConfig) -> Self {
        let session = ResponderSession::with_oracle(env.clone(), oracle, config);
        Self { env, session, channel: None }
    }

    /// True once the channel is available.
    pub fn is_ready(&self) -> bool {
        self.channel.is_some()
    }

    /// Underlying session.
    pub fn session(&self) -> &ResponderSession<E, O> {
        &self.session
    }

    /// Established channel. `None` until the qubit transfer is processed.
    pub fn channel(&self) -> Option<Arc<SecureChannel<E>>> {
        self.channel.clone()
    }

    /// Measure all qubits, establish the key and reply with our bases.
    ///
    /// # Errors
    ///
    /// - `MalformedMessage` / `LengthMismatch` for a bad transfer; the
    ///   session stays uninitialized and can take the next transfer
    /// - `InvalidState` if a key already exists for this session
    pub fn handle_qubit_transfer(
        &mut self,
        transfer: &QubitTransfer,
    ) -> Result<Vec<ResponderAction>, SessionError> {
        let bits = BitSequence::from_raw(&transfer.bits)?;
        let sent_bases = BasisSequence::from_raw(&transfer.bases)?;

        let (_, own_bases) = self.session.measure(&bits, &sent_bases)?;
        self.session.finalize_key(sent_bases)?;

        let Some(established) = self.session.established() else {
            return Err(SessionError::InvalidState {
                state: self.session.state(),
                operation: "open channel",
            });
        };
        self.channel = Some(Arc::new(SecureChannel::new(self.env.clone(), established)));

        Ok(vec![ResponderAction::SendBases(BasisReply { bases: own_bases.to_vec() })])
    }

    /// Decode and process a raw qubit transfer payload.
    ///
    /// # Errors
    ///
    /// See [`handle_qubit_transfer`](Self::handle_qubit_transfer).
    pub fn handle_qubit_payload(
        &mut self,
        payload: &[u8],
    ) -> Result<Vec<ResponderAction>, SessionError> {
        let transfer = QubitTransfer::decode(payload)?;
        self.handle_qubit_transfer(&transfer)
    }

    /// Decrypt one record.
    ///
    /// Never fails: a record that cannot be delivered yields
    /// [`ResponderAction::Drop`] and the session carries on.
    pub fn handle_encrypted_data(&self, message: &EncryptedData) -> Vec<ResponderAction> {
        let Some(channel) = &self.channel else {
            warn!("received encrypted data but key is not established yet");
            return vec![ResponderAction::Drop { reason: "key not established".to_string() }];
        };

        match channel.open_message(message) {
            Ok(record) => {
                debug!(len = record.len(), "record decrypted");
                vec![ResponderAction::Deliver(record)]
            },
            Err(e) => {
                warn!(error = %e, "dropping record");
                vec![ResponderAction::Drop { reason: e.to_string() }]
            },
        }
    }

    /// Decode and decrypt a raw encrypted data payload.
    pub fn handle_encrypted_payload(&self, payload: &[u8]) -> Vec<ResponderAction> {
        match EncryptedData::decode(payload) {
            Ok(message) => self.handle_encrypted_data(&message),
            Err(e) => {
                warn!(error = %e, "dropping malformed encrypted data");
                vec![ResponderAction::Drop { reason: e.to_string() }]
            },
        }
    }
}
