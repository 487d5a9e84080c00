//! qlink key exchange core.
//!
//! BB84-style key agreement between a vehicle (initiator) and a roadside
//! unit (responder), followed by an authenticated record channel keyed from
//! the agreed bits.
//!
//! # Architecture
//!
//! Everything here is Sans-IO. Sessions and handshakes take inputs (messages,
//! time) as arguments and return actions or results; the node runtime owns
//! the pub/sub transport and the clock. Time and randomness come from an
//! [`Environment`] so tests run against a seeded RNG and a virtual clock.
//!
//! # Components
//!
//! - [`bits`]: bit, basis and sifted-key sequences
//! - [`oracle`]: the measurement contract standing in for quantum hardware
//! - [`sifting`]: basis reconciliation
//! - [`InitiatorSession`] / [`ResponderSession`]: per-party key exchange
//! - [`InitiatorHandshake`] / [`ResponderHandshake`]: message handling and
//!   the handshake timeout
//! - [`SecureChannel`]: record encryption under the established key
//!
//! # Invariants
//!
//! - Both parties sift with the same pair of basis sequences, so in the
//!   noiseless model their sifted keys are identical
//! - A session never produces a key before both basis sequences are known
//! - A handshake that timed out never yields a channel

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bits;
pub mod channel;
pub mod config;
pub mod env;
pub mod error;
pub mod handshake;
pub mod oracle;
pub mod session;
pub mod sifting;

pub use bits::{Basis, BasisSequence, BitSequence, MeasurementResult, SiftedKey};
pub use channel::SecureChannel;
pub use config::SessionConfig;
pub use env::Environment;
pub use error::SessionError;
pub use handshake::{
    HandshakePhase, InitiatorAction, InitiatorHandshake, ResponderAction, ResponderHandshake,
};
pub use oracle::{CoinFlipOracle, MeasurementOracle};
pub use session::{EstablishedKey, InitiatorSession, ResponderSession, Role, SessionState};
pub use sifting::{SiftStats, matching_indices, sift};
