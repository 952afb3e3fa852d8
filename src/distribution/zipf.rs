//! Zipf key sampler
//!
//! A small number of keys receive the majority of accesses.
//!
//! # Characteristics
//!
//! - Power law: P(k) ∝ 1 / k^alpha for k in [1, N]
//! - alpha near 0: close to uniform
//! - alpha above 1: strongly skewed toward key 1
//!
//! # Performance
//!
//! Inverse transform sampling over a precomputed cumulative table: O(N)
//! once to build, O(log N) per draw.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use mdpulse::distribution::{Distribution, zipf::{ZipfDistribution, ZipfTable}};
//!
//! let table = Arc::new(ZipfTable::new(1.2, 1000).unwrap());
//! let mut dist = ZipfDistribution::from_table(table, Some(42));
//! let key = dist.next_key();
//! assert!(key >= 1 && key <= 1000);
//! ```

use super::Distribution;
use anyhow::bail;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::Arc;

/// Cumulative Zipf probabilities over `[1, N]`
///
/// Holds N + 1 entries: `cdf[0] = 0.0`, `cdf[i]` is the probability of
/// drawing a key ≤ i, and the last entry is pinned to exactly 1.0 so that
/// rounding in the running sum cannot leave a gap at the top.
#[derive(Debug)]
pub struct ZipfTable {
    alpha: f64,
    cdf: Vec<f64>,
}

impl ZipfTable {
    /// Build the table for exponent `alpha` over `n` keys
    pub fn new(alpha: f64, n: u64) -> crate::Result<Self> {
        if !alpha.is_finite() || alpha <= 0.0 {
            bail!("zipf alpha must be finite and > 0, got {}", alpha);
        }
        if n == 0 {
            bail!("zipf universe must be at least 1");
        }

        let n = n as usize;
        let weights: Vec<f64> = (1..=n).map(|k| (k as f64).powf(-alpha)).collect();
        let norm: f64 = weights.iter().sum();

        let mut cdf = Vec::with_capacity(n + 1);
        cdf.push(0.0);
        let mut cumulative = 0.0;
        for w in &weights {
            cumulative += w / norm;
            cdf.push(cumulative);
        }
        cdf[n] = 1.0;

        Ok(Self { alpha, cdf })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Number of keys
    pub fn universe(&self) -> u64 {
        (self.cdf.len() - 1) as u64
    }

    /// Smallest key i ≥ 1 with `cdf[i] >= z`, for z in (0, 1)
    #[inline]
    pub fn key_for(&self, z: f64) -> u64 {
        // cdf[0] = 0 < z and cdf[N] = 1 > z keep the result in [1, N]
        self.cdf.partition_point(|&c| c < z) as u64
    }
}

/// Per-worker Zipf sampler over a shared table
pub struct ZipfDistribution {
    table: Arc<ZipfTable>,
    rng: Xoshiro256PlusPlus,
}

impl ZipfDistribution {
    /// Create a sampler over `table`, seeded from `seed` or from entropy
    pub fn from_table(table: Arc<ZipfTable>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        Self { table, rng }
    }
}

impl Distribution for ZipfDistribution {
    fn next_key(&mut self) -> u64 {
        // Open interval: redraw on exactly 0
        let z = loop {
            let z: f64 = self.rng.gen();
            if z > 0.0 && z < 1.0 {
                break z;
            }
        };
        self.table.key_for(z)
    }

    fn universe(&self) -> u64 {
        self.table.universe()
    }
}
