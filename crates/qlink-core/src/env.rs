//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (time, randomness). The
//! same sessions run against a seeded RNG and virtual clock in tests and
//! against OS entropy and wall-clock time in production.

use std::time::Duration;

/// Abstract environment providing time, randomness, and async sleeping.
///
/// This is the protocol's random source: raw key bits, basis choices,
/// measurement coin flips and AEAD nonces are all drawn from it.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Concurrent `random_bytes()` calls never return the same stream bytes
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code awaits this; session logic takes time as input.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates a uniformly random bit (0 or 1).
    fn random_bit(&self) -> u8 {
        let mut byte = [0u8; 1];
        self.random_bytes(&mut byte);
        byte[0] & 1
    }

    /// Generates `count` uniformly random bits, one per element.
    fn random_bits(&self, count: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; count.div_ceil(8)];
        self.random_bytes(&mut bytes);
        (0..count).map(|i| (bytes[i / 8] >> (7 - i % 8)) & 1).collect()
    }
}

/// Test environments.
pub mod test_utils {
    use std::{
        future::Future,
        pin::Pin,
        sync::{Arc, Mutex, PoisonError},
        task::{Context, Poll},
        time::{Duration, Instant},
    };

    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    use super::Environment;

    /// Deterministic environment: seeded ChaCha20 RNG and a virtual clock.
    ///
    /// Clones share both the RNG stream and the clock, so two sessions built
    /// from clones of one `MockEnv` never draw the same bytes.
    #[derive(Clone, Debug)]
    pub struct MockEnv {
        rng: Arc<Mutex<ChaCha20Rng>>,
        origin: Instant,
        elapsed: Arc<Mutex<Duration>>,
    }

    impl MockEnv {
        /// Environment with a fixed default seed.
        pub fn new() -> Self {
            Self::with_seed(0x5142_4238_3400_0001)
        }

        /// Environment with the given seed.
        #[allow(clippy::disallowed_methods)]
        pub fn with_seed(seed: u64) -> Self {
            Self {
                rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
                origin: Instant::now(),
                elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            }
        }

        /// Move the virtual clock forward.
        pub fn advance(&self, duration: Duration) {
            let mut elapsed = self.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
            *elapsed += duration;
        }
    }

    /// Future returned by [`MockEnv::sleep`].
    ///
    /// Yields to the executor once, then advances the virtual clock and
    /// completes. A sleep dropped before completion (for example the losing
    /// branch of a `select!`) leaves the clock untouched.
    #[derive(Debug)]
    pub struct MockSleep {
        env: MockEnv,
        duration: Duration,
        yielded: bool,
    }

    impl Future for MockSleep {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if !self.yielded {
                self.yielded = true;
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }
            self.env.advance(self.duration);
            Poll::Ready(())
        }
    }

    impl Default for MockEnv {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Environment for MockEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            self.origin + *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
            MockSleep { env: self.clone(), duration, yielded: false }
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        future::Future,
        pin::pin,
        task::{Context, Waker},
        time::Duration,
    };

    use super::{Environment, test_utils::MockEnv};

    #[test]
    fn same_seed_same_stream() {
        let a = MockEnv::with_seed(7);
        let b = MockEnv::with_seed(7);
        assert_eq!(a.random_bits(64), b.random_bits(64));
    }

    #[test]
    fn clones_share_stream() {
        let a = MockEnv::with_seed(7);
        let b = a.clone();
        assert_ne!(a.random_u64(), b.random_u64());
    }

    #[test]
    fn random_bits_are_binary() {
        let env = MockEnv::new();
        let bits = env.random_bits(1000);
        assert_eq!(bits.len(), 1000);
        assert!(bits.iter().all(|&b| b <= 1));

        // Both values appear
        assert!(bits.contains(&0));
        assert!(bits.contains(&1));
    }

    #[test]
    fn virtual_clock_advances() {
        let env = MockEnv::new();
        let t0 = env.now();
        env.advance(Duration::from_secs(5));
        assert_eq!(env.now() - t0, Duration::from_secs(5));
    }

    #[test]
    fn dropped_sleep_leaves_clock_alone() {
        let env = MockEnv::new();
        let t0 = env.now();

        drop(env.sleep(Duration::from_secs(30)));
        assert_eq!(env.now(), t0);
    }

    #[test]
    fn sleep_advances_clock_on_completion() {
        let env = MockEnv::new();
        let t0 = env.now();
        let mut cx = Context::from_waker(Waker::noop());
        let mut sleep = pin!(env.sleep(Duration::from_secs(30)));

        // First poll only yields
        assert!(sleep.as_mut().poll(&mut cx).is_pending());
        assert_eq!(env.now(), t0);

        assert!(sleep.as_mut().poll(&mut cx).is_ready());
        assert_eq!(env.now() - t0, Duration::from_secs(30));
    }
}
