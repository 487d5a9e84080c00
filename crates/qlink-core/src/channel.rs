//! Authenticated record channel over an established session key.
//!
//! A `SecureChannel` is immutable once built. `seal` draws a fresh random
//! nonce from the environment on every call, so any number of producers can
//! share one channel behind an `Arc` without coordinating nonces.

use qlink_crypto::{
    EncryptedEnvelope, NONCE_SIZE, SymmetricKey, decrypt_record, encrypt_record,
};
use qlink_proto::EncryptedData;

use crate::{env::Environment, error::SessionError, session::EstablishedKey};

/// Encrypts and decrypts telemetry records under one session key.
pub struct SecureChannel<E: Environment> {
    env: E,
    key: SymmetricKey,
    sifted_len: usize,
}

impl<E: Environment> SecureChannel<E> {
    /// Channel keyed by a completed key exchange.
    pub fn new(env: E, established: &EstablishedKey) -> Self {
        Self {
            env,
            key: established.symmetric_key().clone(),
            sifted_len: established.sifted_key().len(),
        }
    }

    /// Number of sifted bits the key was derived from.
    pub fn sifted_len(&self) -> usize {
        self.sifted_len
    }

    /// True if the key was derived from zero sifted bits.
    pub fn is_degenerate(&self) -> bool {
        self.sifted_len == 0
    }

    /// Short key fingerprint for logs.
    pub fn fingerprint(&self) -> String {
        self.key.fingerprint()
    }

    /// Encrypt one record under a fresh nonce.
    pub fn seal(&self, record: &[u8]) -> EncryptedEnvelope {
        let mut nonce = [0u8; NONCE_SIZE];
        self.env.random_bytes(&mut nonce);
        encrypt_record(record, &self.key, nonce)
    }

    /// Verify and decrypt one envelope.
    ///
    /// # Errors
    ///
    /// - `AuthFailure` if the tag does not verify
    pub fn open(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>, SessionError> {
        Ok(decrypt_record(envelope, &self.key)?)
    }

    /// Encrypt one record into its wire message.
    pub fn seal_message(&self, record: &[u8]) -> EncryptedData {
        let envelope = self.seal(record);
        EncryptedData {
            ciphertext: envelope.ciphertext,
            nonce: envelope.nonce.to_vec(),
            tag: envelope.tag.to_vec(),
        }
    }

    /// Verify and decrypt a wire message.
    ///
    /// # Errors
    ///
    /// - `AuthFailure` if the nonce or tag is malformed or does not verify
    pub fn open_message(&self, message: &EncryptedData) -> Result<Vec<u8>, SessionError> {
        let EncryptedData { ciphertext, nonce, tag } = message;
        let envelope = EncryptedEnvelope::from_parts(ciphertext.clone(), nonce, tag)?;
        self.open(&envelope)
    }
}

impl<E: Environment> std::fmt::Debug for SecureChannel<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureChannel")
            .field("fingerprint", &self.fingerprint())
            .field("sifted_len", &self.sifted_len)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread};

    use super::*;
    use crate::{
        config::SessionConfig, env::test_utils::MockEnv, session::InitiatorSession,
    };

    fn channel(env: &MockEnv) -> SecureChannel<MockEnv> {
        let config = SessionConfig { num_bits: 32, ..SessionConfig::default() };
        let mut session = InitiatorSession::new(env.clone(), config);
        let (_, bases) = session.generate().unwrap();
        session.finalize_key(bases).unwrap();
        SecureChannel::new(env.clone(), session.established().unwrap())
    }

    #[test]
    fn seal_open_roundtrip() {
        let env = MockEnv::new();
        let channel = channel(&env);
        let record = b"42,car7,10.00,20.00,5.00,0.10,laneA";

        let envelope = channel.seal(record);
        assert_eq!(channel.open(&envelope).unwrap(), record);
        assert_eq!(channel.sifted_len(), 32);
        assert!(!channel.is_degenerate());
    }

    #[test]
    fn wire_message_roundtrip() {
        let env = MockEnv::new();
        let channel = channel(&env);

        let message = channel.seal_message(b"record");
        assert_eq!(message.nonce.len(), NONCE_SIZE);
        assert_eq!(channel.open_message(&message).unwrap(), b"record");
    }

    #[test]
    fn truncated_nonce_is_auth_failure() {
        let env = MockEnv::new();
        let channel = channel(&env);

        let mut message = channel.seal_message(b"record");
        message.nonce.truncate(12);

        assert!(matches!(channel.open_message(&message), Err(SessionError::AuthFailure(_))));
    }

    #[test]
    fn nonces_are_unique_across_calls() {
        let env = MockEnv::new();
        let channel = channel(&env);

        let nonces: HashSet<_> = (0..1000).map(|_| channel.seal(b"x").nonce).collect();
        assert_eq!(nonces.len(), 1000);
    }

    #[test]
    fn concurrent_producers_draw_distinct_nonces() {
        let env = MockEnv::new();
        let channel = Arc::new(channel(&env));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let channel = Arc::clone(&channel);
                thread::spawn(move || {
                    (0..250)
                        .map(|i| {
                            let record = format!("{i},car{t},0.00,0.00,0.00,0.00,lane");
                            let envelope = channel.seal(record.as_bytes());
                            assert_eq!(channel.open(&envelope).unwrap(), record.as_bytes());
                            envelope.nonce
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut nonces = HashSet::new();
        for handle in handles {
            for nonce in handle.join().unwrap() {
                assert!(nonces.insert(nonce), "nonce reused");
            }
        }
        assert_eq!(nonces.len(), 1000);
    }
}
