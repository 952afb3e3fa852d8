//! Per-operation pacing delay
//!
//! A [`Throttle`] holds a worker back for a fixed delay before each scripted
//! operation, lowering the offered load without changing the script. The
//! delay is expressed as a deadline, so a sleep that returns early is resumed
//! until the deadline passes.
//!
//! # Modes
//!
//! - **Sleep**: `thread::sleep` until the deadline; frees the CPU
//! - **Spin**: busy-wait with `spin_loop` hints, yielding between checks;
//!   precise for microsecond delays

use crate::config::workload::{ThrottleConfig, ThrottleMode};
use std::time::{Duration, Instant};

/// Pacer applied before each operation
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    delay: Duration,
    mode: ThrottleMode,
}

impl Throttle {
    pub fn new(delay: Duration, mode: ThrottleMode) -> Self {
        Self { delay, mode }
    }

    /// Throttle that never waits
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, ThrottleMode::Sleep)
    }

    pub fn from_config(config: &ThrottleConfig) -> Self {
        Self::new(Duration::from_micros(config.delay_us), config.mode)
    }

    pub fn is_enabled(&self) -> bool {
        !self.delay.is_zero()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait out one pacing delay
    #[inline]
    pub fn pace(&self) {
        if self.delay.is_zero() {
            return;
        }
        let deadline = Instant::now() + self.delay;
        match self.mode {
            ThrottleMode::Sleep => loop {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                std::thread::sleep(deadline - now);
            },
            ThrottleMode::Spin => {
                while Instant::now() < deadline {
                    std::hint::spin_loop();
                    std::thread::yield_now();
                }
            }
        }
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_returns_immediately() {
        let throttle = Throttle::disabled();
        assert!(!throttle.is_enabled());
        let start = Instant::now();
        for _ in 0..1000 {
            throttle.pace();
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_sleep_waits_at_least_delay() {
        let throttle = Throttle::new(Duration::from_millis(2), ThrottleMode::Sleep);
        let start = Instant::now();
        throttle.pace();
        throttle.pace();
        assert!(start.elapsed() >= Duration::from_millis(4));
    }

    #[test]
    fn test_spin_waits_at_least_delay() {
        let throttle = Throttle::from_config(&ThrottleConfig { delay_us: 500, mode: ThrottleMode::Spin });
        let start = Instant::now();
        throttle.pace();
        assert!(start.elapsed() >= Duration::from_micros(500));
    }
}
