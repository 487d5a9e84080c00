//! qlink Cryptographic Primitives
//!
//! Cryptographic building blocks used once a sifted key has been agreed on.
//! Pure functions with deterministic outputs. Callers provide nonce bytes so
//! tests can run deterministically.
//!
//! # Key Lifecycle
//!
//! ```text
//! Sifted key bits (0..=L)
//!        │
//!        ▼
//! MSB-first packing, zero right-padding
//!        │
//!        ▼
//! SHA-256 → Symmetric Key (32 bytes, one per session)
//!        │
//!        ▼
//! AEAD Encryption → Envelope { ciphertext, nonce, tag }
//! ```
//!
//! # Security
//!
//! Authenticity:
//! - XChaCha20-Poly1305 AEAD provides tamper-proof encryption
//! - The tag is verified before any plaintext is released
//! - Failed authentication tag -> reject record
//!
//! Nonce uniqueness:
//! - 24-byte random nonces make collisions negligible across the lifetime of
//!   a session key, so no counter state has to be shared between producers
//!
//! Key strength:
//! - The derived key is only as unpredictable as the sifted bits. An empty
//!   sifted key still derives a key (SHA-256 of the empty string), which is
//!   public knowledge. Callers must surface that case.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod derivation;
pub mod envelope;
mod error;

pub use derivation::{KEY_SIZE, KeyMaterial, KeyMaterialBuf, SymmetricKey, derive_key, pack_bits};
pub use envelope::{EncryptedEnvelope, NONCE_SIZE, TAG_SIZE, decrypt_record, encrypt_record};
pub use error::CipherError;
