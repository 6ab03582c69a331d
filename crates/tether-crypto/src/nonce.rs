//! Nonce generation with a strictly monotonic counter.
//!
//! One generator per channel, advanced only by that channel's encrypt path.
//! No internal locking: callers serialize access per channel.

use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

use tether_core::{unix_now, Nonce, NONCE_BYTE_LEN};

/// Nonce generation errors.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NonceError {
    /// The 32-bit counter would wrap. Wrapping would reuse counter space and
    /// break the freshness guarantee, so the channel must be re-registered
    /// with fresh key material instead.
    #[error("nonce counter exhausted; re-register the channel with fresh keys")]
    CounterExhausted,
}

/// Produces monotonically advancing, collision-resistant nonces.
///
/// Each call increments the counter by exactly 1, draws 24 fresh CSPRNG
/// bytes, and stamps the current wall-clock time. The first nonce ever
/// produced carries counter 1; counter 0 means "nothing sent yet".
#[derive(Debug, Clone, Default)]
pub struct NonceGenerator {
    counter: u32,
}

impl NonceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the next nonce, failing instead of wrapping the counter.
    pub fn next(&mut self) -> Result<Nonce, NonceError> {
        let counter = self
            .counter
            .checked_add(1)
            .ok_or(NonceError::CounterExhausted)?;

        let mut bytes = [0u8; NONCE_BYTE_LEN];
        OsRng.fill_bytes(&mut bytes);

        self.counter = counter;
        Ok(Nonce {
            bytes,
            counter,
            timestamp: unix_now(),
        })
    }

    /// The counter of the most recently produced nonce (0 if none yet).
    pub fn last_counter(&self) -> u32 {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increase_by_one_from_one() {
        let mut generator = NonceGenerator::new();
        for expected in 1..=100u32 {
            let nonce = generator.next().unwrap();
            assert_eq!(nonce.counter, expected);
        }
        assert_eq!(generator.last_counter(), 100);
    }

    #[test]
    fn random_bytes_differ_between_calls() {
        let mut generator = NonceGenerator::new();
        let a = generator.next().unwrap();
        let b = generator.next().unwrap();
        assert_ne!(a.bytes, b.bytes);
    }

    #[test]
    fn exhausted_counter_fails_instead_of_wrapping() {
        let mut generator = NonceGenerator {
            counter: u32::MAX - 1,
        };
        assert!(generator.next().is_ok());
        assert_eq!(generator.next(), Err(NonceError::CounterExhausted));
        // Still exhausted on retry; the counter must not have moved.
        assert_eq!(generator.next(), Err(NonceError::CounterExhausted));
    }

    #[test]
    fn timestamps_are_current() {
        let mut generator = NonceGenerator::new();
        let before = unix_now();
        let nonce = generator.next().unwrap();
        assert!(nonce.timestamp >= before);
        assert!(nonce.timestamp <= unix_now() + 1);
    }
}
