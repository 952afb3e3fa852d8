//! Human-readable text output

use crate::config::Config;
use crate::coordinator::RunSummary;
use crate::stats::aggregator::{KindStats, TailLatencyReport, ThroughputReport};
use crate::util::time::{calculate_ops_rate, format_duration, format_latency_ns, format_rate};
use std::fmt::Write;

/// Format a periodic throughput report
///
/// One line per kind that has seen real attempts; per-worker rows are only
/// printed by [`format_worker_rows`].
pub fn format_throughput_report(report: &ThroughputReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "[{} ops, {} workers]",
        format_number(report.total_ops),
        report.workers.len()
    );
    let mut any = false;
    for kind in report.active_kinds() {
        any = true;
        let _ = writeln!(out, "  {}", format_kind_line(kind));
    }
    if !any {
        let _ = writeln!(out, "  no operations yet");
    }
    out.pop();
    out
}

/// Per-worker rows of a throughput report
pub fn format_worker_rows(report: &ThroughputReport) -> String {
    let mut out = String::new();
    for worker in &report.workers {
        for kind in worker.kinds.iter().filter(|k| k.attempts > 1) {
            let _ = writeln!(out, "  worker {:>3} {}", worker.worker_id, format_kind_line(kind));
        }
    }
    out.pop();
    out
}

fn format_kind_line(kind: &KindStats) -> String {
    format!(
        "{:<6} {}/{} ok, mean {}, {} ops/s",
        kind.kind.label(),
        format_number(kind.successes),
        format_number(kind.attempts),
        format_latency_ns(kind.mean_latency_ns),
        format_rate(kind.throughput)
    )
}

/// Format the final tail latency report
pub fn format_tail_report(report: &TailLatencyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Tail latency ({} samples):", format_number(report.samples as u64));
    for (label, ns) in report.rows() {
        let _ = writeln!(out, "  {:<7} {}", label, format_latency_ns(ns));
    }
    out.pop();
    out
}

/// Print the end-of-run summary to the console
pub fn print_results(summary: &RunSummary, config: &Config) {
    println!("═══════════════════════════════════════════════════════════");
    println!("                    BENCHMARK RESULTS");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!("Script:       {}", config.workload.script);
    println!("Workers:      {}", summary.workers.len());
    println!("Elapsed Time: {:.3}s", summary.elapsed.as_secs_f64());
    println!();

    println!("Operations:");
    for kind in summary.report.active_kinds() {
        println!("  {}", format_kind_line(kind));
    }
    let failures: u64 = summary.workers.iter().map(|w| w.failures).sum();
    let operations: u64 = summary.workers.iter().map(|w| w.operations).sum();
    println!(
        "  Total: {} ops, {} failed, {} ops/s wall clock",
        format_number(operations),
        format_number(failures),
        format_rate(calculate_ops_rate(operations, summary.elapsed))
    );
    println!();

    if config.output.per_worker {
        println!("Per Worker:");
        for worker in &summary.workers {
            println!(
                "  worker {:>3}: {} ops, {} failed in {}",
                worker.worker_id,
                format_number(worker.operations),
                format_number(worker.failures),
                format_duration(worker.elapsed)
            );
        }
        let rows = format_worker_rows(&summary.report);
        if !rows.is_empty() {
            println!("{}", rows);
        }
        println!();
    }

    match summary.tail {
        Some(ref tail) => println!("{}", format_tail_report(tail)),
        None => println!("No latency samples collected"),
    }
    println!();
    println!("═══════════════════════════════════════════════════════════");
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::OperationKind;
    use crate::stats::aggregator::StatsAggregator;
    use crate::stats::GlobalStats;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn test_throughput_report_lists_active_kinds() {
        let stats = GlobalStats::new(1, 1000);
        let id = stats.register().unwrap();
        for _ in 0..3 {
            stats.slot(id).record(OperationKind::Stat, 2_000, true);
        }
        let text = format_throughput_report(&StatsAggregator::report(&stats));
        assert!(text.contains("stat"));
        assert!(text.contains("4/4 ok"));
        assert!(!text.contains("mkdir"));
    }

    #[test]
    fn test_empty_throughput_report() {
        let stats = GlobalStats::new(1, 1000);
        stats.register().unwrap();
        let text = format_throughput_report(&StatsAggregator::report(&stats));
        assert!(text.contains("no operations yet"));
    }

    #[test]
    fn test_tail_report_rows() {
        let tail = TailLatencyReport::from_sorted(&[1_000, 2_000, 3_000]).unwrap();
        let text = format_tail_report(&tail);
        assert!(text.starts_with("Tail latency (3 samples):"));
        assert!(text.contains("p99.99"));
        assert!(text.contains("1.00us"));
        assert_eq!(text.lines().count(), 7);
    }
}
