//! Production environment: tokio time and OS randomness.
//!
//! Time comes from `tokio::time::Instant`, so a runtime started with a paused
//! clock (`#[tokio::test(start_paused = true)]`) drives handshake timeouts
//! without real waiting. Randomness comes from the OS via getrandom and is
//! not reproducible.

use std::time::Duration;

use qlink_core::Environment;

/// Production environment using tokio time and cryptographic RNG.
///
/// # Security
///
/// Raw key bits, basis choices, measurement coin flips and AEAD nonces are
/// all drawn from getrandom (`/dev/urandom` on Linux, `BCryptGenRandom` on
/// Windows).
///
/// # Panics
///
/// Panics if the OS RNG fails. A node without working randomness would
/// produce predictable keys and repeated nonces.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_advances_paused_clock() {
        let env = SystemEnv::new();

        let start = env.now();
        env.sleep(Duration::from_secs(30)).await;

        assert!(env.now() - start >= Duration::from_secs(30));
    }

    #[test]
    fn random_bytes_are_random() {
        let env = SystemEnv::new();

        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        env.random_bytes(&mut a);
        env.random_bytes(&mut b);

        assert_ne!(a, b, "random bytes should differ");
    }

    #[test]
    fn random_bits_are_balanced() {
        let env = SystemEnv::new();
        let ones: usize = env.random_bits(10_000).iter().map(|&b| usize::from(b)).sum();
        assert!((4_500..=5_500).contains(&ones), "ones = {ones}");
    }
}
