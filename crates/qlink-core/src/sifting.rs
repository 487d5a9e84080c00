//! Basis reconciliation.
//!
//! Both peers run the same algorithm over the same pair of basis sequences:
//! walk the indices in ascending order, keep the source bit wherever the
//! bases agree, and stop once `max_len` bits have been kept. The initiator
//! keeps its prepared bits, the responder its measured bits. Without noise
//! these are equal at every agreeing index, so both sides end up with
//! identical sifted keys.

use crate::{
    bits::{BasisSequence, BitSequence, SiftedKey},
    error::SessionError,
};

/// Summary of one reconciliation, for logging and handshake quality checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiftStats {
    /// Positions compared (N)
    pub total: usize,
    /// Positions where the bases agreed
    pub matching: usize,
    /// Bits kept after truncation to the maximum length
    pub kept: usize,
}

impl SiftStats {
    /// True if no bit was kept; the derived key is then public knowledge.
    pub fn is_degenerate(&self) -> bool {
        self.kept == 0
    }
}

/// Indices where the two basis sequences agree, ascending.
///
/// Positions past the shorter sequence are not compared.
pub fn matching_indices(own: &BasisSequence, peer: &BasisSequence) -> Vec<usize> {
    own.as_slice()
        .iter()
        .zip(peer.as_slice())
        .enumerate()
        .filter_map(|(i, (a, b))| (a == b).then_some(i))
        .collect()
}

/// Extract the sifted key.
///
/// Indices beyond `max_len` kept bits are ignored. Zero agreeing positions
/// give an empty key, which is not an error.
///
/// # Errors
///
/// - `LengthMismatch` if the sequences are not all the same length
pub fn sift(
    own: &BasisSequence,
    peer: &BasisSequence,
    source: &BitSequence,
    max_len: usize,
) -> Result<(SiftedKey, SiftStats), SessionError> {
    if peer.len() != own.len() {
        return Err(SessionError::LengthMismatch { expected: own.len(), actual: peer.len() });
    }
    if source.len() != own.len() {
        return Err(SessionError::LengthMismatch { expected: own.len(), actual: source.len() });
    }

    let matching = matching_indices(own, peer);
    let bits: Vec<u8> =
        matching.iter().take(max_len).map(|&i| source.as_slice()[i]).collect();

    let stats = SiftStats { total: own.len(), matching: matching.len(), kept: bits.len() };
    Ok((SiftedKey::new(bits), stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bases(raw: &[u8]) -> BasisSequence {
        BasisSequence::from_raw(raw).unwrap()
    }

    fn bits(raw: &[u8]) -> BitSequence {
        BitSequence::from_raw(raw).unwrap()
    }

    #[test]
    fn eight_qubit_scenario() {
        let initiator = bases(&[0, 1, 0, 1, 0, 1, 0, 1]);
        let responder = bases(&[0, 0, 0, 1, 1, 1, 0, 0]);
        let initiator_bits = bits(&[1, 1, 0, 0, 1, 0, 1, 1]);

        assert_eq!(matching_indices(&initiator, &responder), vec![0, 2, 3, 5, 6]);

        let (key, stats) = sift(&initiator, &responder, &initiator_bits, 256).unwrap();
        assert_eq!(key.bits(), &[1, 0, 0, 0, 1]);
        assert_eq!(stats, SiftStats { total: 8, matching: 5, kept: 5 });
    }

    #[test]
    fn truncates_to_max_len() {
        let all_zero = bases(&[0; 10]);
        let source = bits(&[1, 0, 1, 0, 1, 0, 1, 0, 1, 0]);

        let (key, stats) = sift(&all_zero, &all_zero, &source, 4).unwrap();
        assert_eq!(key.bits(), &[1, 0, 1, 0]);
        assert_eq!(stats.matching, 10);
        assert_eq!(stats.kept, 4);
    }

    #[test]
    fn no_matches_gives_empty_key() {
        let own = bases(&[0, 1, 0, 1]);
        let peer = bases(&[1, 0, 1, 0]);

        let (key, stats) = sift(&own, &peer, &bits(&[1, 1, 1, 1]), 256).unwrap();
        assert!(key.is_empty());
        assert!(stats.is_degenerate());
    }

    #[test]
    fn zero_max_len_gives_empty_key() {
        let own = bases(&[0, 0]);
        let (key, stats) = sift(&own, &own, &bits(&[1, 1]), 0).unwrap();
        assert!(key.is_empty());
        assert_eq!(stats.matching, 2);
    }

    #[test]
    fn rejects_length_mismatch() {
        let result = sift(&bases(&[0, 1, 0]), &bases(&[0, 1]), &bits(&[1, 1, 1]), 256);
        assert_eq!(result.unwrap_err(), SessionError::LengthMismatch { expected: 3, actual: 2 });

        let result = sift(&bases(&[0, 1]), &bases(&[0, 1]), &bits(&[1]), 256);
        assert_eq!(result.unwrap_err(), SessionError::LengthMismatch { expected: 2, actual: 1 });
    }

    #[test]
    fn sifting_is_symmetric() {
        let a = bases(&[0, 1, 1, 0, 1, 0]);
        let b = bases(&[0, 0, 1, 1, 1, 0]);
        assert_eq!(matching_indices(&a, &b), matching_indices(&b, &a));
    }
}
