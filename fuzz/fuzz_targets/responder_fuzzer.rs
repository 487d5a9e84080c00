//! Fuzz target for the responder handshake
//!
//! Drives a responder with an arbitrary sequence of qubit transfers and
//! encrypted records, some built from a real initiator, some corrupted.
//!
//! # Invariants
//!
//! - No input sequence panics
//! - At most one qubit transfer establishes a key
//! - Once both sides hold a key, they hold the same key
//! - Only records sealed under that key are delivered, unchanged
//! - Corrupted records are dropped, never delivered

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use qlink_core::{
    env::test_utils::MockEnv, BasisSequence, InitiatorSession, ResponderAction,
    ResponderHandshake, SecureChannel, SessionConfig,
};
use qlink_proto::QubitTransfer;

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    seed: u64,
    /// Qubit count, clamped to 1..=64
    num_bits: u8,
    operations: Vec<Operation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Operation {
    /// Send the initiator's genuine transfer
    GenuineTransfer,
    /// Send arbitrary bytes on the qubit topic
    RawTransfer(Vec<u8>),
    /// Seal a record under the initiator's key, if it has one
    SealedRecord(Vec<u8>),
    /// Seal a record, then flip one bit of the wire message
    CorruptedRecord { record: Vec<u8>, position: u16 },
    /// Send arbitrary bytes on the data topic
    RawRecord(Vec<u8>),
}

fuzz_target!(|scenario: Scenario| {
    let env = MockEnv::with_seed(scenario.seed);
    let config = SessionConfig {
        num_bits: usize::from(scenario.num_bits.clamp(1, 64)),
        ..SessionConfig::default()
    };

    let mut initiator = InitiatorSession::new(env.clone(), config.clone());
    let (bits, bases) = initiator.generate().unwrap();
    let transfer = QubitTransfer { bits: bits.to_vec(), bases: bases.to_vec() };

    let mut responder = ResponderHandshake::new(env.clone(), config);
    let mut channel: Option<SecureChannel<MockEnv>> = None;
    let mut replies = 0;

    for operation in scenario.operations.into_iter().take(64) {
        match operation {
            Operation::GenuineTransfer => {
                if let Ok(actions) = responder.handle_qubit_transfer(&transfer) {
                    replies += 1;
                    let [ResponderAction::SendBases(reply)] = actions.as_slice() else {
                        panic!("expected a single basis reply, got {actions:?}");
                    };
                    let peer = BasisSequence::from_raw(&reply.bases).unwrap();
                    initiator.finalize_key(peer).unwrap();
                    let established = initiator.established().unwrap();
                    channel = Some(SecureChannel::new(env.clone(), established));
                }
            },
            Operation::RawTransfer(payload) => {
                if responder.handle_qubit_payload(&payload).is_ok() {
                    replies += 1;
                }
            },
            Operation::SealedRecord(record) => {
                let Some(channel) = &channel else { continue };
                let message = channel.seal_message(&record);
                assert_eq!(
                    responder.handle_encrypted_data(&message),
                    vec![ResponderAction::Deliver(record)]
                );
            },
            Operation::CorruptedRecord { record, position } => {
                let Some(channel) = &channel else { continue };
                let mut message = channel.seal_message(&record);
                let total = message.ciphertext.len() + message.nonce.len() + message.tag.len();
                let mut index = usize::from(position) % total;
                for field in [&mut message.ciphertext, &mut message.nonce, &mut message.tag] {
                    if index < field.len() {
                        field[index] ^= 0x01;
                        break;
                    }
                    index -= field.len();
                }
                assert!(matches!(
                    responder.handle_encrypted_data(&message).as_slice(),
                    [ResponderAction::Drop { .. }]
                ));
            },
            Operation::RawRecord(payload) => {
                let actions = responder.handle_encrypted_payload(&payload);
                assert_eq!(actions.len(), 1);
            },
        }
    }

    assert!(replies <= 1, "responder established more than one key");

    if let (Some(a), Some(b)) = (initiator.established(), responder.session().established()) {
        assert_eq!(a.symmetric_key(), b.symmetric_key());
    }
});
