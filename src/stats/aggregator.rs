//! Statistics aggregation
//!
//! This module turns the per-worker counters held in [`GlobalStats`] into the
//! two reports the benchmark prints:
//!
//! - **Throughput report**: per worker and per kind, success count, mean
//!   latency and operation rate, plus an aggregate view. Taken with relaxed
//!   loads while workers keep running, so it is a consistent-enough snapshot
//!   rather than an exact one.
//! - **Tail latency report**: percentiles over the raw samples of every
//!   worker, computed once after all workers have finished.
//!
//! # Aggregation Rules
//!
//! - Per worker: `mean = time_ns / attempts` (integer division) and
//!   `rate = attempts / (time_ns / 1e9)`
//! - Aggregate attempts, failures and time are sums
//! - Aggregate mean is summed time over summed attempts
//! - Aggregate rate is the **sum of per-worker rates**: workers run in
//!   parallel, so their busy times overlap
//!
//! # Example
//!
//! ```
//! use mdpulse::client::OperationKind;
//! use mdpulse::stats::{GlobalStats, aggregator::StatsAggregator};
//!
//! let stats = GlobalStats::new(2, 1000);
//! let id = stats.register().unwrap();
//! stats.slot(id).record(OperationKind::MakeDir, 999, true);
//!
//! let report = StatsAggregator::report(&stats);
//! let mkdir = report.aggregate(OperationKind::MakeDir);
//! assert_eq!(mkdir.attempts, 2);
//! assert_eq!(mkdir.mean_latency_ns, 500);
//! ```

use super::{GlobalStats, OpSnapshot};
use crate::client::OperationKind;
use serde::Serialize;

/// Derived statistics for one operation kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KindStats {
    pub kind: OperationKind,
    pub attempts: u64,
    pub fails: u64,
    pub successes: u64,
    pub time_ns: u64,
    pub mean_latency_ns: u64,
    /// Operations per second
    pub throughput: f64,
}

impl KindStats {
    fn from_snapshot(kind: OperationKind, snap: OpSnapshot) -> Self {
        let attempts = snap.attempts.max(1);
        let time_ns = snap.time_ns.max(1);
        Self {
            kind,
            attempts: snap.attempts,
            fails: snap.fails,
            successes: snap.attempts.saturating_sub(snap.fails),
            time_ns: snap.time_ns,
            mean_latency_ns: time_ns / attempts,
            throughput: attempts as f64 / (time_ns as f64 / 1e9),
        }
    }
}

/// One worker's row of a throughput report
#[derive(Debug, Clone, Serialize)]
pub struct WorkerThroughput {
    pub worker_id: usize,
    pub kinds: Vec<KindStats>,
}

/// Periodic throughput snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ThroughputReport {
    /// Operations counted across all workers when the report was taken
    pub total_ops: u64,
    pub workers: Vec<WorkerThroughput>,
    /// Aggregate per kind, in [`OperationKind::ALL`] order
    pub kinds: Vec<KindStats>,
}

impl ThroughputReport {
    /// Aggregate statistics for `kind`
    pub fn aggregate(&self, kind: OperationKind) -> &KindStats {
        &self.kinds[kind.index()]
    }

    /// Kinds that saw at least one real attempt
    pub fn active_kinds(&self) -> impl Iterator<Item = &KindStats> {
        let workers = self.workers.len() as u64;
        self.kinds.iter().filter(move |k| k.attempts > workers)
    }
}

/// Latency percentiles over the combined raw samples, in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TailLatencyReport {
    pub samples: usize,
    pub min: u64,
    pub p10: u64,
    pub p50: u64,
    pub p99: u64,
    pub p999: u64,
    pub p9999: u64,
}

impl TailLatencyReport {
    /// Percentiles of an ascending sample set, `None` when empty
    ///
    /// Each percentile q is `sorted[floor(q * n)]`.
    pub fn from_sorted(sorted: &[u64]) -> Option<Self> {
        if sorted.is_empty() {
            return None;
        }
        let n = sorted.len();
        let at = |q: f64| sorted[((q * n as f64) as usize).min(n - 1)];
        Some(Self {
            samples: n,
            min: sorted[0],
            p10: at(0.1),
            p50: at(0.5),
            p99: at(0.99),
            p999: at(0.999),
            p9999: at(0.9999),
        })
    }

    /// Percentiles as (label, nanoseconds) pairs in report order
    pub fn rows(&self) -> [(&'static str, u64); 6] {
        [
            ("min", self.min),
            ("p10", self.p10),
            ("p50", self.p50),
            ("p99", self.p99),
            ("p99.9", self.p999),
            ("p99.99", self.p9999),
        ]
    }
}

/// Builds reports from [`GlobalStats`]
pub struct StatsAggregator;

impl StatsAggregator {
    /// Snapshot every registered worker
    pub fn report(stats: &GlobalStats) -> ThroughputReport {
        let workers: Vec<WorkerThroughput> = stats
            .slots()
            .iter()
            .enumerate()
            .map(|(worker_id, slot)| WorkerThroughput {
                worker_id,
                kinds: OperationKind::ALL
                    .iter()
                    .map(|&kind| KindStats::from_snapshot(kind, slot.snapshot(kind)))
                    .collect(),
            })
            .collect();

        let kinds = OperationKind::ALL
            .iter()
            .map(|&kind| {
                let mut attempts = 0u64;
                let mut fails = 0u64;
                let mut time_ns = 0u64;
                let mut throughput = 0.0;
                for worker in &workers {
                    let k = &worker.kinds[kind.index()];
                    attempts += k.attempts;
                    fails += k.fails;
                    time_ns += k.time_ns;
                    throughput += k.throughput;
                }
                KindStats {
                    kind,
                    attempts,
                    fails,
                    successes: attempts.saturating_sub(fails),
                    time_ns,
                    mean_latency_ns: if attempts == 0 { 0 } else { time_ns / attempts },
                    throughput,
                }
            })
            .collect();

        ThroughputReport {
            total_ops: stats.total_ops(),
            workers,
            kinds,
        }
    }

    /// Take every worker's raw samples and compute percentiles
    ///
    /// Drains the slot buffers, so a second call sees no samples.
    pub fn compute_tail_latencies(stats: &GlobalStats) -> Option<TailLatencyReport> {
        let mut all: Vec<u64> = Vec::new();
        for slot in stats.slots() {
            let samples = slot.take_samples();
            if all.is_empty() {
                all = samples;
            } else {
                all.extend_from_slice(&samples);
            }
        }
        all.sort_unstable();
        TailLatencyReport::from_sorted(&all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_includes_seed_sample() {
        let stats = GlobalStats::new(1, 1000);
        let id = stats.register().unwrap();
        let samples = [100u64, 200, 300, 400];
        for l in samples {
            stats.slot(id).record(OperationKind::Stat, l, true);
        }
        let report = StatsAggregator::report(&stats);
        let stat = &report.workers[0].kinds[OperationKind::Stat.index()];
        let expected = (samples.iter().sum::<u64>() + 1) / (samples.len() as u64 + 1);
        assert_eq!(stat.mean_latency_ns, expected);
        assert_eq!(stat.successes, 5);
    }

    #[test]
    fn test_failures_and_successes() {
        let stats = GlobalStats::new(1, 1000);
        let id = stats.register().unwrap();
        stats.slot(id).record(OperationKind::Unlink, 10, false);
        stats.slot(id).record(OperationKind::Unlink, 10, true);
        let unlink = *StatsAggregator::report(&stats).aggregate(OperationKind::Unlink);
        assert_eq!(unlink.attempts, 3);
        assert_eq!(unlink.fails, 1);
        assert_eq!(unlink.successes, 2);
    }

    #[test]
    fn test_aggregate_throughput_sums_worker_rates() {
        let stats = GlobalStats::new(2, 1000);
        let a = stats.register().unwrap();
        let b = stats.register().unwrap();
        // Worker a: 10 attempts over ~1ms; worker b: 10 attempts over ~2ms
        for _ in 0..9 {
            stats.slot(a).record(OperationKind::Create, 111_111, true);
            stats.slot(b).record(OperationKind::Create, 222_222, true);
        }
        let report = StatsAggregator::report(&stats);
        let rate_a = report.workers[0].kinds[OperationKind::Create.index()].throughput;
        let rate_b = report.workers[1].kinds[OperationKind::Create.index()].throughput;
        let aggregate = report.aggregate(OperationKind::Create);

        assert!((aggregate.throughput - (rate_a + rate_b)).abs() < 1e-6);
        // Ratio over sums would be lower than the sum of rates
        let ratio = aggregate.attempts as f64 / (aggregate.time_ns as f64 / 1e9);
        assert!(aggregate.throughput > ratio);
    }

    #[test]
    fn test_active_kinds_skips_untouched() {
        let stats = GlobalStats::new(2, 1000);
        stats.register().unwrap();
        let id = stats.register().unwrap();
        stats.slot(id).record(OperationKind::MakeDir, 5, true);
        let report = StatsAggregator::report(&stats);
        let active: Vec<OperationKind> = report.active_kinds().map(|k| k.kind).collect();
        assert_eq!(active, vec![OperationKind::MakeDir]);
    }

    #[test]
    fn test_tail_percentile_indices() {
        let sorted: Vec<u64> = (0..10_000).collect();
        let tail = TailLatencyReport::from_sorted(&sorted).unwrap();
        assert_eq!(tail.min, 0);
        assert_eq!(tail.p10, 1000);
        assert_eq!(tail.p50, 5000);
        assert_eq!(tail.p99, 9900);
        assert_eq!(tail.p999, 9990);
        assert_eq!(tail.p9999, 9999);
    }

    #[test]
    fn test_tail_single_sample() {
        let tail = TailLatencyReport::from_sorted(&[42]).unwrap();
        assert!(tail.rows().iter().all(|&(_, v)| v == 42));
        assert!(TailLatencyReport::from_sorted(&[]).is_none());
    }

    #[test]
    fn test_tail_resort_idempotent() {
        let stats = GlobalStats::new(2, 1000);
        let a = stats.register().unwrap();
        let b = stats.register().unwrap();
        stats.slot(a).publish_samples(vec![50, 10, 40]);
        stats.slot(b).publish_samples(vec![30, 20]);

        let first = StatsAggregator::compute_tail_latencies(&stats).unwrap();
        assert_eq!(first.samples, 5);
        assert_eq!(first.min, 10);
        assert_eq!(first.p50, 30);

        // Feeding the already sorted set back gives identical percentiles
        stats.slot(a).publish_samples(vec![10, 20, 30, 40, 50]);
        let second = StatsAggregator::compute_tail_latencies(&stats).unwrap();
        assert_eq!(first, second);

        // Buffers were drained
        assert!(StatsAggregator::compute_tail_latencies(&stats).is_none());
    }
}
