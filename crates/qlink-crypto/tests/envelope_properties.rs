//! Property-based tests for key derivation and record envelopes
//!
//! These tests verify the fundamental invariants:
//!
//! 1. **Round-trip**: decrypt(encrypt(r, k), k) == r for all records
//! 2. **Tamper evidence**: flipping any bit of ciphertext, nonce or tag fails
//! 3. **Determinism**: same sifted bits always derive the same key
//! 4. **Representation independence**: bits and their packed bytes agree

use proptest::prelude::*;
use qlink_crypto::{
    CipherError, EncryptedEnvelope, KeyMaterial, NONCE_SIZE, TAG_SIZE, decrypt_record,
    derive_key, encrypt_record, pack_bits,
};

fn bits_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..=1, 0..=256)
}

fn nonce_strategy() -> impl Strategy<Value = [u8; NONCE_SIZE]> {
    prop::collection::vec(any::<u8>(), NONCE_SIZE..=NONCE_SIZE).prop_map(|v| {
        let mut arr = [0u8; NONCE_SIZE];
        arr.copy_from_slice(&v);
        arr
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_encrypt_decrypt_roundtrip(
        record in prop::collection::vec(any::<u8>(), 0..1000),
        bits in bits_strategy(),
        nonce in nonce_strategy(),
    ) {
        let key = derive_key(KeyMaterial::Bits(&bits));

        let envelope = encrypt_record(&record, &key, nonce);
        let decrypted = decrypt_record(&envelope, &key).unwrap();

        prop_assert_eq!(decrypted, record);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_any_bit_flip_is_detected(
        record in prop::collection::vec(any::<u8>(), 1..200),
        nonce in nonce_strategy(),
        selector in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let key = derive_key(KeyMaterial::Bytes(b"tamper-test"));
        let envelope = encrypt_record(&record, &key, nonce);

        // Pick one byte across the ciphertext || nonce || tag space
        let total = envelope.ciphertext.len() + NONCE_SIZE + TAG_SIZE;
        let position = selector.index(total);

        let mut tampered = envelope.clone();
        if position < tampered.ciphertext.len() {
            tampered.ciphertext[position] ^= 1 << bit;
        } else if position < tampered.ciphertext.len() + NONCE_SIZE {
            tampered.nonce[position - envelope.ciphertext.len()] ^= 1 << bit;
        } else {
            tampered.tag[position - envelope.ciphertext.len() - NONCE_SIZE] ^= 1 << bit;
        }

        let result = decrypt_record(&tampered, &key);
        prop_assert!(
            matches!(result, Err(CipherError::AuthFailure { .. })),
            "tampered envelope must fail authentication"
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_derivation_deterministic(bits in bits_strategy()) {
        let a = derive_key(KeyMaterial::Bits(&bits));
        let b = derive_key(KeyMaterial::Bits(&bits));
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_bits_equal_packed_bytes(bits in bits_strategy()) {
        let packed = pack_bits(&bits);
        prop_assert_eq!(packed.len(), bits.len().div_ceil(8));

        let from_bits = derive_key(KeyMaterial::Bits(&bits));
        let from_bytes = derive_key(KeyMaterial::Bytes(&packed));
        prop_assert_eq!(from_bits, from_bytes);
    }

    #[test]
    fn prop_distinct_bytes_derive_distinct_keys(
        a in prop::collection::vec(any::<u8>(), 0..64),
        b in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(derive_key(KeyMaterial::Bytes(&a)), derive_key(KeyMaterial::Bytes(&b)));
    }
}

#[test]
fn telemetry_record_roundtrip() {
    let record = "42,car7,10.00,20.00,5.00,0.10,laneA";
    let key = derive_key(KeyMaterial::Bits(&[1, 1, 0, 1]));

    let envelope = encrypt_record(record.as_bytes(), &key, [0x5A; NONCE_SIZE]);
    let rebuilt =
        EncryptedEnvelope::from_parts(envelope.ciphertext.clone(), &envelope.nonce, &envelope.tag)
            .unwrap();
    let decrypted = decrypt_record(&rebuilt, &key).unwrap();

    assert_eq!(String::from_utf8(decrypted).unwrap(), record);
}
