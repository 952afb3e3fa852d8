//! Uniform key sampler
//!
//! Every key in `[1, N]` has (nearly) equal probability. A raw 64-bit draw is
//! reduced modulo N; the modulo bias is below 2^-40 for any universe a
//! metadata benchmark populates.
//!
//! # Example
//!
//! ```
//! use mdpulse::distribution::{Distribution, uniform::UniformDistribution};
//!
//! let mut dist = UniformDistribution::new(1024, Some(3));
//! for _ in 0..10 {
//!     let key = dist.next_key();
//!     assert!(key >= 1 && key <= 1024);
//! }
//! ```

use super::Distribution;
use rand::RngCore;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Uniform random sampler
///
/// Uses the xoshiro256++ PRNG, which is fast and has good statistical
/// properties.
pub struct UniformDistribution {
    universe: u64,
    rng: Xoshiro256PlusPlus,
}

impl UniformDistribution {
    /// Create a sampler over `[1, universe]`, seeded from `seed` or from entropy
    ///
    /// A zero universe is treated as one key.
    pub fn new(universe: u64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        Self {
            universe: universe.max(1),
            rng,
        }
    }
}

impl Distribution for UniformDistribution {
    #[inline(always)]
    fn next_key(&mut self) -> u64 {
        self.rng.next_u64() % self.universe + 1
    }

    fn universe(&self) -> u64 {
        self.universe
    }
}
