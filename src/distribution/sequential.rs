//! Sequential key sweep
//!
//! Returns 1, 2, ..., N and wraps back to 1.

use crate::distribution::Distribution;

/// Sequential key generator
#[derive(Debug)]
pub struct SequentialDistribution {
    universe: u64,
    position: u64,
}

impl SequentialDistribution {
    pub fn new(universe: u64) -> Self {
        Self {
            universe: universe.max(1),
            position: 0,
        }
    }
}

impl Distribution for SequentialDistribution {
    fn next_key(&mut self) -> u64 {
        let key = self.position % self.universe + 1;
        self.position += 1;
        key
    }

    fn universe(&self) -> u64 {
        self.universe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_wraparound() {
        let mut dist = SequentialDistribution::new(3);
        let keys: Vec<u64> = (0..7).map(|_| dist.next_key()).collect();
        assert_eq!(keys, vec![1, 2, 3, 1, 2, 3, 1]);
    }
}
