//! Bit and basis sequences.
//!
//! Sequences are immutable once built. Construction from wire values
//! validates that every element is 0 or 1, so downstream code can index
//! without re-checking.

use qlink_crypto::pack_bits;

use crate::{env::Environment, error::SessionError};

/// One of the two conjugate measurement bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Basis {
    /// Z basis: |0⟩, |1⟩
    Rectilinear = 0,
    /// X basis: |+⟩, |−⟩
    Diagonal = 1,
}

impl Basis {
    /// Wire value (0 or 1).
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// The other basis.
    pub fn conjugate(self) -> Self {
        match self {
            Self::Rectilinear => Self::Diagonal,
            Self::Diagonal => Self::Rectilinear,
        }
    }
}

impl TryFrom<u8> for Basis {
    type Error = SessionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Rectilinear),
            1 => Ok(Self::Diagonal),
            other => Err(SessionError::MalformedMessage(format!("basis value {other}"))),
        }
    }
}

/// Ordered sequence of binary values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSequence(Vec<u8>);

/// Bits observed by the responder, one per received qubit.
pub type MeasurementResult = BitSequence;

impl BitSequence {
    /// Validate raw values.
    ///
    /// # Errors
    ///
    /// - `MalformedMessage` if any value is not 0 or 1
    pub fn from_raw(bits: &[u8]) -> Result<Self, SessionError> {
        if let Some(index) = bits.iter().position(|&b| b > 1) {
            return Err(SessionError::MalformedMessage(format!(
                "bit {index} has value {}",
                bits[index]
            )));
        }
        Ok(Self(bits.to_vec()))
    }

    /// `count` uniformly random bits.
    pub fn random<E: Environment>(env: &E, count: usize) -> Self {
        Self(env.random_bits(count))
    }

    /// Bit values.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no bits.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Wire representation.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.clone()
    }
}

/// Ordered sequence of basis choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasisSequence(Vec<Basis>);

impl BasisSequence {
    /// Validate raw wire values.
    ///
    /// # Errors
    ///
    /// - `MalformedMessage` if any value is not 0 or 1
    pub fn from_raw(bases: &[u8]) -> Result<Self, SessionError> {
        bases.iter().map(|&b| Basis::try_from(b)).collect::<Result<Vec<_>, _>>().map(Self)
    }

    /// `count` uniformly random bases.
    pub fn random<E: Environment>(env: &E, count: usize) -> Self {
        Self(
            env.random_bits(count)
                .into_iter()
                .map(|b| if b == 0 { Basis::Rectilinear } else { Basis::Diagonal })
                .collect(),
        )
    }

    /// Basis choices.
    pub fn as_slice(&self) -> &[Basis] {
        &self.0
    }

    /// Number of bases.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if there are no bases.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Wire representation (0 = rectilinear, 1 = diagonal).
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.iter().map(|b| b.to_u8()).collect()
    }
}

impl FromIterator<Basis> for BasisSequence {
    fn from_iter<T: IntoIterator<Item = Basis>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Bits kept after reconciliation, in ascending index order.
///
/// May be empty when no bases matched. An empty key derives a publicly
/// known symmetric key and must be reported as degenerate.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SiftedKey(Vec<u8>);

impl SiftedKey {
    pub(crate) fn new(bits: Vec<u8>) -> Self {
        Self(bits)
    }

    /// Bit values.
    pub fn bits(&self) -> &[u8] {
        &self.0
    }

    /// Number of sifted bits.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no bits survived sifting.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bits as a `'0'`/`'1'` string.
    pub fn to_bit_string(&self) -> String {
        self.0.iter().map(|&b| if b == 0 { '0' } else { '1' }).collect()
    }

    /// Bits packed MSB-first, zero-padded to a whole byte.
    pub fn to_bytes(&self) -> Vec<u8> {
        pack_bits(&self.0)
    }
}

impl std::fmt::Debug for SiftedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiftedKey").field("len", &self.0.len()).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::test_utils::MockEnv;

    #[test]
    fn basis_wire_values() {
        assert_eq!(Basis::try_from(0).unwrap(), Basis::Rectilinear);
        assert_eq!(Basis::try_from(1).unwrap(), Basis::Diagonal);
        assert!(matches!(Basis::try_from(2), Err(SessionError::MalformedMessage(_))));
        assert_eq!(Basis::Diagonal.conjugate(), Basis::Rectilinear);
    }

    #[test]
    fn bit_sequence_rejects_non_binary() {
        assert!(BitSequence::from_raw(&[0, 1, 1, 0]).is_ok());
        let err = BitSequence::from_raw(&[0, 1, 3]).unwrap_err();
        assert!(matches!(err, SessionError::MalformedMessage(reason) if reason.contains("bit 2")));
    }

    #[test]
    fn bits_and_bases_parse_the_same_wire_slice() {
        let wire: &[u8] = &[0, 1, 1, 0];
        let bits = BitSequence::from_raw(wire).unwrap();
        let bases = BasisSequence::from_raw(wire).unwrap();
        assert_eq!(bits.to_vec(), bases.to_vec());
    }

    #[test]
    fn basis_sequence_wire_roundtrip() {
        let bases = BasisSequence::from_raw(&[0, 1, 1, 0]).unwrap();
        assert_eq!(bases.as_slice()[1], Basis::Diagonal);
        assert_eq!(bases.to_vec(), vec![0, 1, 1, 0]);
    }

    #[test]
    fn random_sequences_have_requested_length() {
        let env = MockEnv::new();
        assert_eq!(BitSequence::random(&env, 256).len(), 256);
        assert_eq!(BasisSequence::random(&env, 13).len(), 13);
        assert!(BitSequence::random(&env, 0).is_empty());
    }

    #[test]
    fn sifted_key_representations() {
        let key = SiftedKey::new(vec![1, 0, 1]);
        assert_eq!(key.to_bit_string(), "101");
        assert_eq!(key.to_bytes(), vec![0xA0]);
        assert_eq!(format!("{key:?}"), "SiftedKey { len: 3, .. }");
    }
}
