//! JSON messages carried over the publish/subscribe channel.
//!
//! The channel is opaque: each message is serialized to a JSON byte payload
//! and published on a logical topic. Decoding validates structure and value
//! ranges so that session code only ever sees well-formed sequences.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// Topic for the initiator's bits and bases.
pub const TOPIC_SEND_QUBITS: &str = "quantum/send_qubits";

/// Topic for the responder's basis reply.
pub const TOPIC_RECEIVE_BASIS: &str = "quantum/receive_basis";

/// Topic for encrypted telemetry envelopes.
pub const TOPIC_ENCRYPTED_DATA: &str = "vehicle/encrypted_data";

/// Initiator → Responder: the prepared qubits.
///
/// Each position `i` describes one qubit: the encoded bit and the basis it
/// was prepared in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QubitTransfer {
    /// Encoded bit values, each 0 or 1
    pub bits: Vec<u8>,
    /// Preparation bases, each 0 (rectilinear) or 1 (diagonal)
    pub bases: Vec<u8>,
}

/// Responder → Initiator: the bases the responder measured in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasisReply {
    /// Measurement bases, each 0 or 1
    pub bases: Vec<u8>,
}

/// Initiator → Responder: one encrypted telemetry record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    /// Ciphertext bytes
    #[serde(with = "crate::b64")]
    pub ciphertext: Vec<u8>,
    /// AEAD nonce bytes
    #[serde(with = "crate::b64")]
    pub nonce: Vec<u8>,
    /// Detached authentication tag bytes
    #[serde(with = "crate::b64")]
    pub tag: Vec<u8>,
}

impl QubitTransfer {
    const NAME: &'static str = "qubit-transfer";

    /// Decode and validate a qubit transfer payload.
    ///
    /// # Errors
    ///
    /// - `MalformedMessage` if the JSON is invalid, values fall outside
    ///   {0,1}, or `bits` and `bases` differ in length
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let msg: Self = decode_json(Self::NAME, payload)?;

        if msg.bits.len() != msg.bases.len() {
            return Err(ProtocolError::malformed(
                Self::NAME,
                format!("{} bits but {} bases", msg.bits.len(), msg.bases.len()),
            ));
        }
        check_binary(Self::NAME, "bits", &msg.bits)?;
        check_binary(Self::NAME, "bases", &msg.bases)?;

        Ok(msg)
    }

    /// Serialize to a JSON payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_json(self)
    }
}

impl BasisReply {
    const NAME: &'static str = "basis-reply";

    /// Decode and validate a basis reply payload.
    ///
    /// # Errors
    ///
    /// - `MalformedMessage` if the JSON is invalid or values fall outside
    ///   {0,1}
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let msg: Self = decode_json(Self::NAME, payload)?;
        check_binary(Self::NAME, "bases", &msg.bases)?;
        Ok(msg)
    }

    /// Serialize to a JSON payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_json(self)
    }
}

impl EncryptedData {
    const NAME: &'static str = "encrypted-data";

    /// Decode an encrypted data payload.
    ///
    /// Field lengths are not checked here; the cipher rejects envelopes
    /// whose nonce or tag has the wrong size.
    ///
    /// # Errors
    ///
    /// - `MalformedMessage` if the JSON is invalid or a field is not base64
    pub fn decode(payload: &[u8]) -> Result<Self> {
        decode_json(Self::NAME, payload)
    }

    /// Serialize to a JSON payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_json(self)
    }
}

fn decode_json<'a, T: Deserialize<'a>>(name: &'static str, payload: &'a [u8]) -> Result<T> {
    serde_json::from_slice(payload).map_err(|e| ProtocolError::malformed(name, e.to_string()))
}

fn encode_json<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(msg).map_err(|e| ProtocolError::Encode(e.to_string()))
}

fn check_binary(name: &'static str, field: &str, values: &[u8]) -> Result<()> {
    match values.iter().position(|&v| v > 1) {
        Some(index) => Err(ProtocolError::malformed(
            name,
            format!("{field}[{index}] = {} is not 0 or 1", values[index]),
        )),
        None => Ok(()),
    }
}
