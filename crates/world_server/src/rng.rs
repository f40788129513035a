//! Injected randomness service.
//!
//! One explicitly owned generator shared by the orchestrator, seeded from
//! entropy in production and from a fixed seed in tests so outcomes are
//! reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// A seedable random number source handed to the orchestrator at startup.
#[derive(Debug)]
pub struct RandomService {
    rng: Mutex<StdRng>,
}

impl RandomService {
    /// Creates a service seeded from OS entropy.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Creates a deterministic service from an explicit seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Uniform value in `[low, high)`.
    pub fn range(&self, low: i32, high: i32) -> i32 {
        debug_assert!(low < high);
        self.rng
            .lock()
            .expect("rng mutex poisoned")
            .gen_range(low..high)
    }

    /// Uniform index into a collection of `len` elements.
    pub fn index(&self, len: usize) -> usize {
        debug_assert!(len > 0);
        self.rng
            .lock()
            .expect("rng mutex poisoned")
            .gen_range(0..len)
    }
}

impl Default for RandomService {
    fn default() -> Self {
        Self::new()
    }
}
