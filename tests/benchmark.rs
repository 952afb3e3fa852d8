//! Multi-worker runs against the in-memory client

use mdpulse::client::mock::MockClient;
use mdpulse::client::OperationKind;
use mdpulse::config::workload::{BackendType, WorkloadScript};
use mdpulse::config::Config;
use mdpulse::coordinator::{run_benchmark, run_workers};
use mdpulse::distribution::AccessPattern;
use mdpulse::stats::recorder::CollectingSink;
use std::sync::Arc;

fn config(script: WorkloadScript, threads: usize) -> Config {
    let mut config = Config::default();
    config.client.backend = BackendType::Memory;
    config.workload.script = script;
    config.workers.threads = threads;
    config.workers.seed = Some(42);
    config
}

#[test]
fn test_private_mkdir_counts_every_attempt() {
    let mut config = config(WorkloadScript::PrivateMkdir, 4);
    config.workload.count = 250;
    config.workers.report_interval = 100;
    config.workers.sampled_kinds = vec![OperationKind::MakeDir];

    let clients: Vec<_> = (0..4).map(|_| MockClient::new()).collect();
    let sink = Arc::new(CollectingSink::new());
    let summary = run_workers(&config, clients, sink.clone()).unwrap();

    // One namespace mkdir plus `count` private mkdirs per worker
    let ops = 4 * 251;
    let mkdir = summary.report.aggregate(OperationKind::MakeDir);
    assert_eq!(mkdir.attempts, ops + 4);
    assert_eq!(mkdir.successes, ops + 4);
    assert_eq!(summary.report.total_ops, ops);

    assert_eq!(sink.throughput_reports().len(), (ops / 100) as usize);
    let tails = sink.tail_reports();
    assert_eq!(tails.len(), 1);
    assert_eq!(tails[0].samples, ops as usize);
    assert_eq!(summary.tail, Some(tails[0]));
}

#[test]
fn test_skewed_stat_hits_populated_keys() {
    let mut config = config(WorkloadScript::SkewedStat, 4);
    config.workload.universe = 50;
    config.workload.depth = 3;
    config.workload.count = 200;
    config.workload.access = AccessPattern::Zipf { alpha: 0.99 };

    let summary = run_benchmark(&config, Arc::new(CollectingSink::new())).unwrap();

    let stat = summary.report.aggregate(OperationKind::Stat);
    assert_eq!(stat.attempts, 4 * 200 + 4);
    assert_eq!(stat.fails, 0);
    assert_eq!(summary.tail.map(|t| t.samples), Some(800));
    assert!(summary.workers.iter().all(|w| w.failures == 0));
}

#[test]
fn test_nested_create_stat_shared_namespace() {
    let mut config = config(WorkloadScript::NestedCreateStat, 3);
    config.workload.count = 40;
    config.workload.stat_count = 120;
    config.workload.access = AccessPattern::Uniform;

    let shared = MockClient::new();
    let clients = vec![shared.clone(), shared.clone(), shared.clone()];
    let summary = run_workers(&config, clients, Arc::new(CollectingSink::new())).unwrap();

    let create = summary.report.aggregate(OperationKind::Create);
    assert_eq!(create.attempts, 3 * 40 + 3);
    assert_eq!(create.fails, 0);
    let stat = summary.report.aggregate(OperationKind::Stat);
    assert_eq!(stat.fails, 0);
    for id in 0..3 {
        assert!(shared.exists(&format!("/mdpulse.{}", id)));
    }
}
