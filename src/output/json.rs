//! JSON output format
//!
//! A run ends with one [`BenchmarkSummary`] document: the configuration that
//! produced it, per-kind aggregates, per-worker outcomes and the tail
//! latencies.

use crate::config::Config;
use crate::coordinator::RunSummary;
use crate::stats::aggregator::{KindStats, TailLatencyReport};
use crate::Result;
use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        Self {
            micros: d.as_micros() as u64,
            human: crate::util::time::format_duration(d),
        }
    }
}

/// Run identification
#[derive(Debug, Clone, Serialize)]
pub struct JsonRunInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// RFC 3339 timestamp taken when the summary was built
    pub finished_at: String,
    pub duration: JsonDuration,
    pub config: Config,
}

/// One worker's outcome
#[derive(Debug, Clone, Serialize)]
pub struct JsonWorker {
    pub worker_id: usize,
    pub operations: u64,
    pub failures: u64,
    pub elapsed: JsonDuration,
}

/// Complete JSON document
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkSummary {
    pub run: JsonRunInfo,
    pub total_ops: u64,
    /// Aggregates of the kinds the run exercised
    pub operations: Vec<KindStats>,
    pub workers: Vec<JsonWorker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail_latency_ns: Option<TailLatencyReport>,
}

impl BenchmarkSummary {
    pub fn build(summary: &RunSummary, config: &Config) -> Self {
        Self {
            run: JsonRunInfo {
                hostname: node_hostname(),
                finished_at: Utc::now().to_rfc3339(),
                duration: JsonDuration::from_duration(summary.elapsed),
                config: config.clone(),
            },
            total_ops: summary.report.total_ops,
            operations: summary.report.active_kinds().copied().collect(),
            workers: summary
                .workers
                .iter()
                .map(|w| JsonWorker {
                    worker_id: w.worker_id,
                    operations: w.operations,
                    failures: w.failures,
                    elapsed: JsonDuration::from_duration(w.elapsed),
                })
                .collect(),
            tail_latency_ns: summary.tail,
        }
    }
}

fn node_hostname() -> Option<String> {
    hostname::get().ok().and_then(|h| h.into_string().ok())
}

/// Write JSON output to file
pub fn write_json_output(output_path: &Path, summary: &BenchmarkSummary, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;
    let writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(writer, summary)?;
    } else {
        serde_json::to_writer(writer, summary)?;
    }

    Ok(())
}
