//! Statistics collection
//!
//! Lock-free per-worker counters with cache-line alignment.
//!
//! Every worker owns one [`WorkerSlot`] in a pre-allocated arena held by
//! [`GlobalStats`]. The owning worker is the only writer of its slot; the
//! aggregator reads every slot with relaxed loads while workers keep running,
//! so a periodic report never blocks the hot path.
//!
//! - **Per-kind triples**: attempts, failures and cumulative nanoseconds per
//!   [`OperationKind`], initialized to (1, 0, 1) so rates and means are
//!   defined before the first sample
//! - **Cache-line alignment**: prevents false sharing between worker threads
//! - **Raw latency samples**: kept locally by the recorder for the sampled
//!   kinds and published into the slot when the worker finishes
//! - **Last-finisher detection**: the worker that drops the running count
//!   from 1 to 0 computes the tail latencies
//!
//! # Capacity
//!
//! The arena is sized once (default [`DEFAULT_MAX_WORKERS`]); registering
//! more workers than that is an error rather than a reallocation.
//!
//! # Example
//!
//! ```
//! use mdpulse::client::OperationKind;
//! use mdpulse::stats::GlobalStats;
//!
//! let stats = GlobalStats::new(4, 1000);
//! let id = stats.register().unwrap();
//! stats.slot(id).record(OperationKind::Stat, 250, true);
//!
//! let snap = stats.slot(id).snapshot(OperationKind::Stat);
//! assert_eq!(snap.attempts, 2);
//! assert_eq!(snap.time_ns, 251);
//! ```

pub mod aggregator;
pub mod recorder;

use crate::client::OperationKind;
use anyhow::bail;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Default worker slot cap
pub const DEFAULT_MAX_WORKERS: usize = 256;

/// Cache-line aligned atomic counter to prevent false sharing
///
/// On most modern CPUs, cache lines are 64 bytes. When multiple threads update
/// adjacent memory locations, the entire cache line is invalidated, causing
/// performance degradation (false sharing). Aligning each counter to a cache
/// line keeps neighbouring workers' counters apart.
///
/// # Memory Layout
///
/// ```text
/// [value: 8 bytes][padding: 56 bytes] = 64 bytes total
/// ```
#[repr(align(64))]
#[derive(Debug)]
pub struct AlignedCounter {
    value: AtomicU64,
    _padding: [u8; 56],
}

impl AlignedCounter {
    /// Create a new counter with the specified initial value
    pub fn with_value(val: u64) -> Self {
        Self {
            value: AtomicU64::new(val),
            _padding: [0; 56],
        }
    }

    /// Increment the counter by the specified amount
    ///
    /// Uses `Ordering::Relaxed`: counters carry no ordering relationship to
    /// each other.
    #[inline]
    pub fn add(&self, val: u64) {
        self.value.fetch_add(val, Ordering::Relaxed);
    }

    /// Get the current value of the counter
    #[inline]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for AlignedCounter {
    fn default() -> Self {
        Self::with_value(0)
    }
}

/// Counters for one operation kind of one worker
#[derive(Debug)]
pub struct OpCounters {
    attempts: AlignedCounter,
    fails: AlignedCounter,
    time_ns: AlignedCounter,
}

/// Point-in-time copy of an [`OpCounters`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpSnapshot {
    pub attempts: u64,
    pub fails: u64,
    pub time_ns: u64,
}

impl OpCounters {
    /// Counters seeded with (1, 0, 1)
    pub fn new() -> Self {
        Self {
            attempts: AlignedCounter::with_value(1),
            fails: AlignedCounter::with_value(0),
            time_ns: AlignedCounter::with_value(1),
        }
    }

    #[inline]
    pub fn record(&self, elapsed_ns: u64, success: bool) {
        self.attempts.add(1);
        self.time_ns.add(elapsed_ns);
        if !success {
            self.fails.add(1);
        }
    }

    pub fn snapshot(&self) -> OpSnapshot {
        OpSnapshot {
            attempts: self.attempts.get(),
            fails: self.fails.get(),
            time_ns: self.time_ns.get(),
        }
    }
}

impl Default for OpCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics of one worker
#[derive(Debug)]
pub struct WorkerSlot {
    ops: [OpCounters; OperationKind::COUNT],
    samples: Mutex<Vec<u64>>,
}

impl WorkerSlot {
    fn new() -> Self {
        Self {
            ops: std::array::from_fn(|_| OpCounters::new()),
            samples: Mutex::new(Vec::new()),
        }
    }

    /// Add one attempt of `kind` taking `elapsed_ns`
    #[inline]
    pub fn record(&self, kind: OperationKind, elapsed_ns: u64, success: bool) {
        self.ops[kind.index()].record(elapsed_ns, success);
    }

    pub fn snapshot(&self, kind: OperationKind) -> OpSnapshot {
        self.ops[kind.index()].snapshot()
    }

    /// Append raw latencies to the slot's sample buffer
    pub fn publish_samples(&self, samples: Vec<u64>) {
        let mut buf = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        if buf.is_empty() {
            *buf = samples;
        } else {
            buf.extend_from_slice(&samples);
        }
    }

    /// Take the sample buffer, leaving an empty one with no allocation
    pub fn take_samples(&self) -> Vec<u64> {
        let mut buf = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *buf)
    }
}

/// Run-wide statistics shared by all workers
#[derive(Debug)]
pub struct GlobalStats {
    slots: Box<[WorkerSlot]>,
    registered: AtomicUsize,
    running: AtomicUsize,
    total_ops: AtomicU64,
    report_interval: u64,
    sampled: [bool; OperationKind::COUNT],
}

impl GlobalStats {
    /// Create an arena of `capacity` slots reporting every `report_interval` ops
    ///
    /// Raw latencies are sampled for Stat only; see [`GlobalStats::with_sampled_kinds`].
    pub fn new(capacity: usize, report_interval: u64) -> Self {
        let mut sampled = [false; OperationKind::COUNT];
        sampled[OperationKind::Stat.index()] = true;
        Self {
            slots: (0..capacity).map(|_| WorkerSlot::new()).collect(),
            registered: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            total_ops: AtomicU64::new(0),
            report_interval: report_interval.max(1),
            sampled,
        }
    }

    /// Replace the set of kinds whose raw latencies are kept
    pub fn with_sampled_kinds(mut self, kinds: &[OperationKind]) -> Self {
        self.sampled = [false; OperationKind::COUNT];
        for kind in kinds {
            self.sampled[kind.index()] = true;
        }
        self
    }

    /// Claim the next worker id
    ///
    /// Ids are dense and start at 0. Every worker must register before any
    /// of them finishes, or the last-finisher rule fires early.
    pub fn register(&self) -> crate::Result<usize> {
        let id = self.registered.fetch_add(1, Ordering::SeqCst);
        if id >= self.slots.len() {
            self.registered.fetch_sub(1, Ordering::SeqCst);
            bail!("worker slot arena is full ({} slots)", self.slots.len());
        }
        self.running.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    /// Mark one worker finished; true for the worker that finished last
    pub fn finish_worker(&self) -> bool {
        self.running.fetch_sub(1, Ordering::AcqRel) == 1
    }

    /// Count one operation and return the new total
    #[inline]
    pub fn count_op(&self) -> u64 {
        self.total_ops.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn slot(&self, worker_id: usize) -> &WorkerSlot {
        &self.slots[worker_id]
    }

    /// Slots of the registered workers, in id order
    pub fn slots(&self) -> &[WorkerSlot] {
        &self.slots[..self.worker_count()]
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn worker_count(&self) -> usize {
        self.registered.load(Ordering::SeqCst).min(self.slots.len())
    }

    pub fn running_workers(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    pub fn total_ops(&self) -> u64 {
        self.total_ops.load(Ordering::Relaxed)
    }

    pub fn report_interval(&self) -> u64 {
        self.report_interval
    }

    #[inline]
    pub fn is_sampled(&self, kind: OperationKind) -> bool {
        self.sampled[kind.index()]
    }
}

impl Default for GlobalStats {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS, 10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_counter_size() {
        assert_eq!(std::mem::size_of::<AlignedCounter>(), 64);
        assert_eq!(std::mem::align_of::<AlignedCounter>(), 64);
    }

    #[test]
    fn test_counters_start_at_one() {
        let counters = OpCounters::new();
        assert_eq!(counters.snapshot(), OpSnapshot { attempts: 1, fails: 0, time_ns: 1 });
        counters.record(10, false);
        assert_eq!(counters.snapshot(), OpSnapshot { attempts: 2, fails: 1, time_ns: 11 });
    }

    #[test]
    fn test_register_dense_ids_and_cap() {
        let stats = GlobalStats::new(2, 100);
        assert_eq!(stats.register().unwrap(), 0);
        assert_eq!(stats.register().unwrap(), 1);
        assert!(stats.register().is_err());
        assert_eq!(stats.worker_count(), 2);
        assert_eq!(stats.running_workers(), 2);
        assert_eq!(stats.slots().len(), 2);
    }

    #[test]
    fn test_last_finisher_detected_once() {
        let stats = GlobalStats::new(4, 100);
        for _ in 0..3 {
            stats.register().unwrap();
        }
        let outcomes: Vec<bool> = (0..3).map(|_| stats.finish_worker()).collect();
        assert_eq!(outcomes, vec![false, false, true]);
        assert_eq!(stats.running_workers(), 0);
    }

    #[test]
    fn test_concurrent_records_sum() {
        const WORKERS: usize = 8;
        const PER_WORKER: u64 = 10_000;
        let stats = GlobalStats::new(WORKERS, 1_000_000);

        std::thread::scope(|s| {
            for _ in 0..WORKERS {
                let id = stats.register().unwrap();
                let stats = &stats;
                s.spawn(move || {
                    for _ in 0..PER_WORKER {
                        stats.slot(id).record(OperationKind::Create, 1, true);
                        stats.count_op();
                    }
                });
            }
        });

        let attempts: u64 = stats.slots().iter().map(|s| s.snapshot(OperationKind::Create).attempts).sum();
        assert_eq!(attempts, WORKERS as u64 * PER_WORKER + WORKERS as u64);
        assert_eq!(stats.total_ops(), WORKERS as u64 * PER_WORKER);
    }

    #[test]
    fn test_take_samples_releases_buffer() {
        let stats = GlobalStats::new(1, 10);
        let id = stats.register().unwrap();
        stats.slot(id).publish_samples(vec![3, 1, 2]);
        stats.slot(id).publish_samples(vec![4]);
        assert_eq!(stats.slot(id).take_samples(), vec![3, 1, 2, 4]);
        assert!(stats.slot(id).take_samples().is_empty());
    }

    #[test]
    fn test_sampled_kinds() {
        let stats = GlobalStats::new(1, 10);
        assert!(stats.is_sampled(OperationKind::Stat));
        assert!(!stats.is_sampled(OperationKind::Create));

        let stats = stats.with_sampled_kinds(&[OperationKind::Create]);
        assert!(stats.is_sampled(OperationKind::Create));
        assert!(!stats.is_sampled(OperationKind::Stat));
    }
}
