//! Per-worker latency recorder
//!
//! A [`LatencyRecorder`] is the handle a worker uses to record operations. It
//! writes the worker's own slot in [`GlobalStats`], counts every operation
//! towards the run-wide total, and keeps raw latencies of the sampled kinds
//! in a local buffer that is only published when the worker finishes.
//!
//! Reports are produced inline by whichever worker crosses a reporting
//! boundary, and handed to a [`ReportSink`].

use super::aggregator::{StatsAggregator, TailLatencyReport, ThroughputReport};
use super::GlobalStats;
use crate::client::OperationKind;
use crate::output::text;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Destination for reports produced during a run
pub trait ReportSink: Send + Sync {
    fn throughput(&self, report: &ThroughputReport);
    fn tail(&self, report: &TailLatencyReport);
}

/// Prints reports to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ReportSink for ConsoleSink {
    fn throughput(&self, report: &ThroughputReport) {
        println!("{}", text::format_throughput_report(report));
    }

    fn tail(&self, report: &TailLatencyReport) {
        println!("{}", text::format_tail_report(report));
    }
}

/// Keeps every report in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    throughput: Mutex<Vec<ThroughputReport>>,
    tails: Mutex<Vec<TailLatencyReport>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn throughput_reports(&self) -> Vec<ThroughputReport> {
        self.throughput.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn tail_reports(&self) -> Vec<TailLatencyReport> {
        self.tails.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ReportSink for CollectingSink {
    fn throughput(&self, report: &ThroughputReport) {
        self.throughput.lock().unwrap_or_else(|e| e.into_inner()).push(report.clone());
    }

    fn tail(&self, report: &TailLatencyReport) {
        self.tails.lock().unwrap_or_else(|e| e.into_inner()).push(*report);
    }
}

impl<S: ReportSink + ?Sized> ReportSink for Arc<S> {
    fn throughput(&self, report: &ThroughputReport) {
        (**self).throughput(report)
    }

    fn tail(&self, report: &TailLatencyReport) {
        (**self).tail(report)
    }
}

/// Recording handle owned by one worker
pub struct LatencyRecorder {
    worker_id: usize,
    stats: Arc<GlobalStats>,
    sink: Arc<dyn ReportSink>,
    samples: Vec<u64>,
}

impl LatencyRecorder {
    /// Create a recorder for an already registered worker
    pub fn new(worker_id: usize, stats: Arc<GlobalStats>, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            worker_id,
            stats,
            sink,
            samples: Vec::new(),
        }
    }

    /// Register a new worker in `stats` and return its recorder
    pub fn register(stats: Arc<GlobalStats>, sink: Arc<dyn ReportSink>) -> crate::Result<Self> {
        let worker_id = stats.register()?;
        Ok(Self::new(worker_id, stats, sink))
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Number of raw samples held locally
    pub fn pending_samples(&self) -> usize {
        self.samples.len()
    }

    /// Record one attempt of `kind`
    pub fn record_op(&mut self, kind: OperationKind, elapsed: Duration, success: bool) {
        let ns = elapsed.as_nanos() as u64;
        self.stats.slot(self.worker_id).record(kind, ns, success);
        if self.stats.is_sampled(kind) {
            self.samples.push(ns);
        }
        self.snapshot_and_maybe_report();
    }

    /// Count one operation; report throughput on interval boundaries
    ///
    /// Returns the report when this call produced one.
    pub fn snapshot_and_maybe_report(&self) -> Option<ThroughputReport> {
        let total = self.stats.count_op();
        if total % self.stats.report_interval() != 0 {
            return None;
        }
        let report = StatsAggregator::report(&self.stats);
        self.sink.throughput(&report);
        Some(report)
    }

    /// Publish samples and leave the run
    ///
    /// The last worker to finish computes the tail latencies, hands them to
    /// the sink and returns them.
    pub fn finish(mut self) -> Option<TailLatencyReport> {
        let samples = std::mem::take(&mut self.samples);
        self.stats.slot(self.worker_id).publish_samples(samples);
        if !self.stats.finish_worker() {
            return None;
        }
        let tail = StatsAggregator::compute_tail_latencies(&self.stats)?;
        self.sink.tail(&tail);
        Some(tail)
    }
}
