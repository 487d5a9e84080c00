//! qlink Wire Protocol
//!
//! JSON messages exchanged over the publish/subscribe channel, plus the
//! telemetry record format carried inside encrypted envelopes.
//!
//! # Handshake
//!
//! ```text
//! Initiator                                   Responder
//!     │  quantum/send_qubits   {bits, bases}      │
//!     │────────────────────────────────────────-->│ measure all N
//!     │  quantum/receive_basis {bases}            │
//!     │<------------------------------------------│
//!     │                                           │
//!   sift, derive                             sift, derive
//!     │  vehicle/encrypted_data {ciphertext,..}   │
//!     │────────────────────────────────────────-->│ decrypt
//! ```
//!
//! # Invariants
//!
//! - Every bit and basis value on the wire is 0 or 1
//! - A qubit transfer carries equally long `bits` and `bases`
//! - Binary envelope fields are standard base64 with padding
//!
//! Decoding never panics; any violation is a
//! [`ProtocolError::MalformedMessage`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod b64;
mod error;
pub mod messages;
pub mod telemetry;

pub use error::{ProtocolError, Result};
pub use messages::{
    BasisReply, EncryptedData, QubitTransfer, TOPIC_ENCRYPTED_DATA, TOPIC_RECEIVE_BASIS,
    TOPIC_SEND_QUBITS,
};
pub use telemetry::TelemetryRecord;
