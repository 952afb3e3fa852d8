//! Key-space access patterns
//!
//! This module provides the key samplers that decide which entry of a
//! populated namespace a worker touches next. Keys are 1-based: a sampler
//! over a universe of N keys returns values in `[1, N]`, and the workload
//! maps each key to a path (`f000001`, `f000002`, ...).
//!
//! # Patterns
//!
//! - **Sequential**: 1, 2, ..., N, 1, 2, ... (deterministic sweep)
//! - **Uniform**: every key equally likely
//! - **Zipf**: power law, low keys are hot
//!
//! # Sharing
//!
//! The Zipf cumulative table costs O(N) to build, so it is built once per
//! run and shared read-only between workers through an `Arc`. Each worker
//! owns its own generator state.
//!
//! # Example
//!
//! ```
//! use mdpulse::distribution::{AccessPattern, SamplerFactory};
//!
//! let factory = SamplerFactory::new(AccessPattern::Zipf { alpha: 1.2 }, 1000, Some(7)).unwrap();
//! let mut sampler = factory.for_worker(0);
//! let key = sampler.next_key();
//! assert!((1..=1000).contains(&key));
//! ```

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod sequential;
pub mod uniform;
pub mod zipf;

use sequential::SequentialDistribution;
use uniform::UniformDistribution;
use zipf::{ZipfDistribution, ZipfTable};

/// Key sampler over a fixed universe
///
/// # Thread Safety
///
/// Samplers must be `Send` so they can move into worker threads. Each worker
/// owns its own instance; none of them share mutable state.
pub trait Distribution: Send {
    /// Next key in `[1, universe]`
    fn next_key(&mut self) -> u64;

    /// Number of keys this sampler draws from
    fn universe(&self) -> u64;
}

impl<D: Distribution + ?Sized> Distribution for Box<D> {
    fn next_key(&mut self) -> u64 {
        (**self).next_key()
    }

    fn universe(&self) -> u64 {
        (**self).universe()
    }
}

/// Access pattern used by the stat phases of a workload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AccessPattern {
    Sequential,
    Uniform,
    Zipf { alpha: f64 },
}

impl Default for AccessPattern {
    fn default() -> Self {
        AccessPattern::Sequential
    }
}

impl fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessPattern::Sequential => write!(f, "sequential"),
            AccessPattern::Uniform => write!(f, "uniform"),
            AccessPattern::Zipf { alpha } => write!(f, "zipf(alpha={})", alpha),
        }
    }
}

/// Builds per-worker samplers that share one precomputed table
#[derive(Debug, Clone)]
pub struct SamplerFactory {
    pattern: AccessPattern,
    universe: u64,
    seed: Option<u64>,
    table: Option<Arc<ZipfTable>>,
}

impl SamplerFactory {
    /// Validate the pattern and precompute whatever the workers will share
    pub fn new(pattern: AccessPattern, universe: u64, seed: Option<u64>) -> crate::Result<Self> {
        if universe == 0 {
            bail!("key universe must be at least 1");
        }
        let table = match pattern {
            AccessPattern::Zipf { alpha } => Some(Arc::new(ZipfTable::new(alpha, universe)?)),
            AccessPattern::Sequential | AccessPattern::Uniform => None,
        };
        Ok(Self {
            pattern,
            universe,
            seed,
            table,
        })
    }

    pub fn pattern(&self) -> AccessPattern {
        self.pattern
    }

    pub fn universe(&self) -> u64 {
        self.universe
    }

    /// Sampler for one worker
    ///
    /// With a configured seed, worker `i` is seeded with `seed + i` so runs
    /// are reproducible; otherwise each sampler seeds from entropy.
    pub fn for_worker(&self, worker_id: usize) -> Box<dyn Distribution> {
        let seed = self.seed.map(|s| s.wrapping_add(worker_id as u64));
        match (&self.pattern, &self.table) {
            (AccessPattern::Zipf { .. }, Some(table)) => {
                Box::new(ZipfDistribution::from_table(Arc::clone(table), seed))
            }
            (AccessPattern::Uniform, _) => Box::new(UniformDistribution::new(self.universe, seed)),
            _ => Box::new(SequentialDistribution::new(self.universe)),
        }
    }
}
