//! Symmetric key derivation from sifted key material.
//!
//! The sifted key is a variable-length bit string (possibly empty). It is
//! packed MSB-first into bytes, right-padded with zero bits, and hashed with
//! SHA-256. The first [`KEY_SIZE`] bytes of the digest become the session key.

use std::fmt;

use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Symmetric key length required by XChaCha20-Poly1305.
pub const KEY_SIZE: usize = 32;

/// Input to [`derive_key`].
///
/// Both representations reduce to a byte string before hashing, so
/// `Bits(&[0,1,0,0,0,0,0,1])` and `Bytes(&[0x41])` derive the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMaterial<'a> {
    /// One bit per element. Only the lowest bit of each element is used.
    Bits(&'a [u8]),
    /// Raw bytes, hashed as-is.
    Bytes(&'a [u8]),
}

impl<'a> KeyMaterial<'a> {
    /// Interpret a textual key.
    ///
    /// A string made only of `'0'`/`'1'` characters is a bit string. Anything
    /// else is taken as its UTF-8 bytes.
    pub fn from_text(text: &'a str) -> KeyMaterialBuf {
        if text.bytes().all(|c| c == b'0' || c == b'1') {
            KeyMaterialBuf::Bits(text.bytes().map(|c| c - b'0').collect())
        } else {
            KeyMaterialBuf::Bytes(text.as_bytes().to_vec())
        }
    }
}

/// Owned counterpart of [`KeyMaterial`], produced when parsing text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterialBuf {
    /// One bit per element
    Bits(Vec<u8>),
    /// Raw bytes
    Bytes(Vec<u8>),
}

impl KeyMaterialBuf {
    /// Borrow as [`KeyMaterial`].
    pub fn as_material(&self) -> KeyMaterial<'_> {
        match self {
            Self::Bits(bits) => KeyMaterial::Bits(bits),
            Self::Bytes(bytes) => KeyMaterial::Bytes(bytes),
        }
    }
}

/// A 32-byte session key.
///
/// Zeroized on drop. `Debug` prints a short fingerprint, never the key.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey {
    key: [u8; KEY_SIZE],
}

impl SymmetricKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Raw key bytes for the AEAD.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// First 4 bytes of SHA-256(key), hex encoded.
    ///
    /// Lets both peers log and compare keys without exposing them.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.key);
        digest[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKey").field("fingerprint", &self.fingerprint()).finish()
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Pack a bit sequence into bytes, most significant bit first.
///
/// The final byte is right-padded with zero bits. An empty input yields an
/// empty output.
pub fn pack_bits(bits: &[u8]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, &bit)| byte | ((bit & 1) << (7 - i)))
        })
        .collect()
}

/// Derive the session key from sifted key material.
///
/// Pure and deterministic: identical material always produces the identical
/// key, on both peers.
pub fn derive_key(material: KeyMaterial<'_>) -> SymmetricKey {
    let mut bytes = match material {
        KeyMaterial::Bits(bits) => pack_bits(bits),
        KeyMaterial::Bytes(bytes) => bytes.to_vec(),
    };

    let digest = Sha256::digest(&bytes);
    bytes.zeroize();

    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&digest[..KEY_SIZE]);
    SymmetricKey { key }
}
