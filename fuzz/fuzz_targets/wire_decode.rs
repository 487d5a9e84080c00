//! Fuzz target for wire message decoding
//!
//! Feeds arbitrary bytes to every decoder a node exposes to the network:
//! - Qubit transfers, basis replies and encrypted data (JSON)
//! - Telemetry record parsing of decrypted text
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.
//! Accepted qubit transfers must be binary and length-aligned.

#![no_main]

use libfuzzer_sys::fuzz_target;
use qlink_proto::{BasisReply, EncryptedData, QubitTransfer, TelemetryRecord};

fuzz_target!(|data: &[u8]| {
    if let Ok(transfer) = QubitTransfer::decode(data) {
        assert_eq!(transfer.bits.len(), transfer.bases.len());
        assert!(transfer.bits.iter().chain(&transfer.bases).all(|&v| v <= 1));
    }

    if let Ok(reply) = BasisReply::decode(data) {
        assert!(reply.bases.iter().all(|&v| v <= 1));
    }

    let _ = EncryptedData::decode(data);

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = text.parse::<TelemetryRecord>();
    }
});
