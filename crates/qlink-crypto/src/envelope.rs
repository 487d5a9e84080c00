//! Record encryption using `XChaCha20-Poly1305`
//!
//! All functions are pure - nonce bytes must be provided by the caller.
//! Sessions draw a fresh random nonce per call from their environment.

use chacha20poly1305::{
    Tag, XChaCha20Poly1305, XNonce,
    aead::{AeadInPlace, KeyInit},
};

use crate::{derivation::SymmetricKey, error::CipherError};

/// `XChaCha20` nonce size (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// An encrypted record with everything needed for decryption except the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    /// Ciphertext, same length as the plaintext
    pub ciphertext: Vec<u8>,
    /// The 24-byte `XChaCha20` nonce
    pub nonce: [u8; NONCE_SIZE],
    /// Detached Poly1305 authentication tag
    pub tag: [u8; TAG_SIZE],
}

impl EncryptedEnvelope {
    /// Assemble an envelope from untrusted parts.
    ///
    /// # Errors
    ///
    /// - `AuthFailure` if the nonce or tag has the wrong length. A malformed
    ///   envelope can never authenticate, so it is reported the same way.
    pub fn from_parts(ciphertext: Vec<u8>, nonce: &[u8], tag: &[u8]) -> Result<Self, CipherError> {
        let nonce: [u8; NONCE_SIZE] = nonce.try_into().map_err(|_| {
            CipherError::auth(format!("nonce must be {NONCE_SIZE} bytes, got {}", nonce.len()))
        })?;
        let tag: [u8; TAG_SIZE] = tag.try_into().map_err(|_| {
            CipherError::auth(format!("tag must be {TAG_SIZE} bytes, got {}", tag.len()))
        })?;

        Ok(Self { ciphertext, nonce, tag })
    }

    /// Plaintext length (the tag is detached, so this equals the ciphertext).
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len()
    }
}

/// Encrypt a record using `XChaCha20-Poly1305`.
///
/// # Security
///
/// - Caller MUST provide a nonce never used before with this key. Random
///   24-byte nonces from a CSPRNG satisfy this.
pub fn encrypt_record(
    plaintext: &[u8],
    key: &SymmetricKey,
    nonce: [u8; NONCE_SIZE],
) -> EncryptedEnvelope {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let mut buffer = plaintext.to_vec();

    let Ok(tag) = cipher.encrypt_in_place_detached(XNonce::from_slice(&nonce), b"", &mut buffer)
    else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(&tag);

    EncryptedEnvelope { ciphertext: buffer, nonce, tag: tag_bytes }
}

/// Decrypt a record using `XChaCha20-Poly1305`.
///
/// The tag is verified before the plaintext is returned. On failure the
/// partially decrypted buffer is discarded.
///
/// # Errors
///
/// - `AuthFailure`: If the tag, nonce, ciphertext or key is incorrect
pub fn decrypt_record(
    envelope: &EncryptedEnvelope,
    key: &SymmetricKey,
) -> Result<Vec<u8>, CipherError> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let mut buffer = envelope.ciphertext.clone();

    cipher
        .decrypt_in_place_detached(
            XNonce::from_slice(&envelope.nonce),
            b"",
            &mut buffer,
            Tag::from_slice(&envelope.tag),
        )
        .map_err(|_| CipherError::auth("tag mismatch"))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::{KeyMaterial, derive_key};

    fn test_key() -> SymmetricKey {
        derive_key(KeyMaterial::Bits(&[1, 0, 1, 1, 0, 1, 0, 0, 1, 1, 1]))
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = test_key();
        let plaintext = b"42,car7,10.00,20.00,5.00,0.10,laneA";

        let envelope = encrypt_record(plaintext, &key, [0xAB; NONCE_SIZE]);
        let decrypted = decrypt_record(&envelope, &key).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn encrypt_decrypt_empty_record() {
        let key = test_key();

        let envelope = encrypt_record(b"", &key, [0x00; NONCE_SIZE]);
        assert!(envelope.ciphertext.is_empty());

        let decrypted = decrypt_record(&envelope, &key).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn ciphertext_matches_plaintext_length() {
        let key = test_key();
        let plaintext = b"test record";

        let envelope = encrypt_record(plaintext, &key, [0x01; NONCE_SIZE]);

        assert_eq!(envelope.ciphertext.len(), plaintext.len());
        assert_eq!(envelope.plaintext_len(), plaintext.len());
        assert_ne!(envelope.ciphertext.as_slice(), plaintext.as_slice());
    }

    #[test]
    fn different_nonces_produce_different_ciphertexts() {
        let key = test_key();
        let plaintext = b"test";

        let a = encrypt_record(plaintext, &key, [0x00; NONCE_SIZE]);
        let b = encrypt_record(plaintext, &key, [0xFF; NONCE_SIZE]);

        assert_ne!(a.ciphertext, b.ciphertext);
        assert_ne!(a.tag, b.tag);
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let key = test_key();
        let envelope = encrypt_record(b"secret record", &key, [0x00; NONCE_SIZE]);

        let wrong_key = derive_key(KeyMaterial::Bits(&[0, 0, 0, 1]));
        let result = decrypt_record(&envelope, &wrong_key);

        assert!(matches!(
            result,
            Err(CipherError::AuthFailure { reason }) if reason.contains("tag")
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_decryption() {
        let key = test_key();
        let mut envelope = encrypt_record(b"original record", &key, [0x00; NONCE_SIZE]);

        envelope.ciphertext[0] ^= 0x01;

        assert!(decrypt_record(&envelope, &key).is_err());
    }

    #[test]
    fn tampered_nonce_fails_decryption() {
        let key = test_key();
        let mut envelope = encrypt_record(b"original record", &key, [0x00; NONCE_SIZE]);

        envelope.nonce[NONCE_SIZE - 1] ^= 0x80;

        assert!(decrypt_record(&envelope, &key).is_err());
    }

    #[test]
    fn tampered_tag_fails_decryption() {
        let key = test_key();
        let mut envelope = encrypt_record(b"original record", &key, [0x00; NONCE_SIZE]);

        envelope.tag[0] ^= 0x01;

        assert!(decrypt_record(&envelope, &key).is_err());
    }

    #[test]
    fn from_parts_rejects_bad_lengths() {
        let short_nonce =
            EncryptedEnvelope::from_parts(vec![1, 2, 3], &[0u8; 12], &[0u8; TAG_SIZE]);
        assert!(matches!(
            short_nonce,
            Err(CipherError::AuthFailure { reason }) if reason.contains("nonce")
        ));

        let long_tag =
            EncryptedEnvelope::from_parts(vec![1, 2, 3], &[0u8; NONCE_SIZE], &[0u8; TAG_SIZE + 1]);
        assert!(matches!(
            long_tag,
            Err(CipherError::AuthFailure { reason }) if reason.contains("tag")
        ));
    }

    #[test]
    fn from_parts_roundtrips_valid_envelope() {
        let key = test_key();
        let envelope = encrypt_record(b"record", &key, [0x07; NONCE_SIZE]);

        let rebuilt = EncryptedEnvelope::from_parts(
            envelope.ciphertext.clone(),
            &envelope.nonce,
            &envelope.tag,
        )
        .unwrap();

        assert_eq!(rebuilt, envelope);
        assert_eq!(decrypt_record(&rebuilt, &key).unwrap(), b"record");
    }
}
