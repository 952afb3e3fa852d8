//! Shared helpers

pub mod throttle;
pub mod time;
