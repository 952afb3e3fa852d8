//! mdpulse - Metadata benchmark driver and filesystem call interception
//!
//! mdpulse drives synthetic metadata workloads (mkdir, rmdir, create, unlink,
//! stat) against a metadata client from many concurrent workers and reports
//! throughput and tail latency. Separately, it provides a shim that redirects
//! filesystem calls under a mount prefix to an out-of-process metadata
//! handler over POSIX message queues.
//!
//! # Architecture
//!
//! - **Key sampling**: sequential, uniform and Zipf access patterns
//! - **Workers**: scripted operation sequences, every call timed
//! - **Statistics**: lock-free per-worker counters, periodic throughput
//!   reports and a final tail latency report
//! - **Request channel**: fixed-size wire records over message queues
//! - **Interception**: mount-prefix dispatch with a libc fallback, exported
//!   for `LD_PRELOAD` with the `preload` feature

pub mod channel;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod distribution;
pub mod output;
pub mod protocol;
pub mod server;
pub mod shim;
pub mod stats;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use client::{MetadataClient, OperationKind};
pub use config::Config;

/// Result type used throughout mdpulse
pub type Result<T> = anyhow::Result<T>;
