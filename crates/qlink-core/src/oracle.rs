//! Measurement oracle.
//!
//! Stands in for a quantum simulator. Only the BB84 measurement statistics
//! are reproduced, not qubit state vectors:
//!
//! - sender basis == measurer basis: the encoded bit comes back unchanged
//! - bases differ: a fair coin flip, independent of the encoded bit
//!
//! No noise and no eavesdropper are modelled.

use crate::{bits::Basis, env::Environment};

/// Measures one prepared qubit in a chosen basis.
pub trait MeasurementOracle {
    /// Outcome (0 or 1) of measuring `bit`, prepared in `sent`, in basis
    /// `measured`.
    fn measure(&self, bit: u8, sent: Basis, measured: Basis) -> u8;
}

/// Oracle backed by the environment's random source.
#[derive(Debug, Clone)]
pub struct CoinFlipOracle<E: Environment> {
    env: E,
}

impl<E: Environment> CoinFlipOracle<E> {
    /// Oracle drawing its coin flips from `env`.
    pub fn new(env: E) -> Self {
        Self { env }
    }
}

impl<E: Environment> MeasurementOracle for CoinFlipOracle<E> {
    fn measure(&self, bit: u8, sent: Basis, measured: Basis) -> u8 {
        if sent == measured { bit & 1 } else { self.env.random_bit() }
    }
}
