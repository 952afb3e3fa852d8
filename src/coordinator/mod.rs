//! Coordinator module
//!
//! Orchestrates workers and aggregates results. A run is:
//!
//! 1. Build the shared key sampler and the statistics arena
//! 2. Register every worker (ids 0..threads) before any of them starts, so
//!    the last-finisher rule sees the full count
//! 3. Build one client per worker for the configured backend
//! 4. Run the workers as scoped threads and join them
//! 5. Take a final throughput report

use crate::client::local::LocalClient;
use crate::client::mock::MockClient;
use crate::client::MetadataClient;
use crate::config::workload::BackendType;
use crate::config::Config;
use crate::distribution::SamplerFactory;
use crate::stats::aggregator::{StatsAggregator, TailLatencyReport, ThroughputReport};
use crate::stats::recorder::{LatencyRecorder, ReportSink};
use crate::stats::GlobalStats;
use crate::util::throttle::Throttle;
use crate::worker::{Worker, WorkerSummary};
use crate::Result;
use anyhow::Context;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Outcome of a complete run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Throughput report taken after every worker finished
    pub report: ThroughputReport,
    pub tail: Option<TailLatencyReport>,
    /// Per-worker outcomes in id order
    pub workers: Vec<WorkerSummary>,
    pub elapsed: Duration,
}

/// Run the configured benchmark with clients built for `config.client.backend`
pub fn run_benchmark(config: &Config, sink: Arc<dyn ReportSink>) -> Result<RunSummary> {
    let clients = build_clients(config)?;
    run_workers(config, clients, sink)
}

/// Run one worker per client
///
/// `clients.len()` workers are started; `config.workers.threads` is ignored.
pub fn run_workers<C: MetadataClient>(
    config: &Config,
    clients: Vec<C>,
    sink: Arc<dyn ReportSink>,
) -> Result<RunSummary> {
    let workers_cfg = &config.workers;
    let workload = &config.workload;

    let sampler = SamplerFactory::new(workload.access, workload.key_universe(), workers_cfg.seed)
        .context("Failed to build key sampler")?;
    let stats = Arc::new(
        GlobalStats::new(workers_cfg.max_workers, workers_cfg.report_interval)
            .with_sampled_kinds(&workers_cfg.sampled_kinds),
    );
    let throttle = workload
        .throttle
        .as_ref()
        .map(Throttle::from_config)
        .unwrap_or_default();

    let mut workers = Vec::with_capacity(clients.len());
    for client in clients {
        let recorder = LatencyRecorder::register(stats.clone(), sink.clone())?;
        let distribution = sampler.for_worker(recorder.worker_id());
        workers.push(Worker::new(client, recorder, distribution, throttle, workload.clone()));
    }
    info!(
        workers = workers.len(),
        script = %workload.script,
        access = %sampler.pattern(),
        "starting workers"
    );

    let start = Instant::now();
    let results: Vec<Result<WorkerSummary>> = std::thread::scope(|s| {
        let handles: Vec<_> = workers
            .into_iter()
            .map(|worker| {
                let id = worker.id();
                std::thread::Builder::new()
                    .name(format!("mdpulse-worker-{}", id))
                    .spawn_scoped(s, move || worker.run())
                    .with_context(|| format!("Failed to spawn worker {}", id))
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle?
                    .join()
                    .map_err(|_| anyhow::anyhow!("Worker thread panicked"))?
            })
            .collect()
    });
    let elapsed = start.elapsed();

    let mut summaries = Vec::with_capacity(results.len());
    let mut first_error = None;
    for result in results {
        match result {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                error!("{:#}", e);
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    let tail = summaries.iter().find_map(|w| w.tail);
    debug!(total_ops = stats.total_ops(), elapsed_ms = elapsed.as_millis() as u64, "all workers joined");
    Ok(RunSummary {
        report: StatsAggregator::report(&stats),
        tail,
        workers: summaries,
        elapsed,
    })
}

/// One client per worker for the configured backend
pub fn build_clients(config: &Config) -> Result<Vec<Box<dyn MetadataClient>>> {
    let threads = config.workers.threads;
    match config.client.backend {
        BackendType::Local => {
            let root = config
                .client
                .root
                .as_ref()
                .context("Local backend requires a namespace root")?;
            std::fs::create_dir_all(root)
                .with_context(|| format!("Failed to create namespace root: {}", root.display()))?;
            Ok((0..threads)
                .map(|_| Box::new(LocalClient::new(root.clone())) as Box<dyn MetadataClient>)
                .collect())
        }
        BackendType::Memory => {
            let shared = MockClient::new();
            Ok((0..threads)
                .map(|_| Box::new(shared.clone()) as Box<dyn MetadataClient>)
                .collect())
        }
        BackendType::Remote => remote_clients(config),
    }
}

#[cfg(target_os = "linux")]
fn remote_clients(config: &Config) -> Result<Vec<Box<dyn MetadataClient>>> {
    use crate::channel::mqueue::MqClient;
    use crate::client::remote::RemoteClient;

    let names = config.channel.names();
    (0..config.workers.threads as u64)
        .map(|id| {
            let transport = MqClient::connect(&names, id)
                .with_context(|| format!("Failed to connect worker {} to the metadata server", id))?;
            Ok(Box::new(RemoteClient::new(transport)) as Box<dyn MetadataClient>)
        })
        .collect()
}

#[cfg(not(target_os = "linux"))]
fn remote_clients(_config: &Config) -> Result<Vec<Box<dyn MetadataClient>>> {
    anyhow::bail!("remote backend requires POSIX message queues (Linux)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Errno, OperationKind};
    use crate::config::workload::WorkloadScript;
    use crate::stats::recorder::CollectingSink;

    fn memory_config(threads: usize) -> Config {
        let mut config = Config::default();
        config.client.backend = BackendType::Memory;
        config.workers.threads = threads;
        config.workers.seed = Some(3);
        config.workload.count = 20;
        config.workload.stat_count = 100;
        config
    }

    #[test]
    fn test_memory_backend_run() {
        let config = memory_config(3);
        let sink = Arc::new(CollectingSink::new());
        let summary = run_benchmark(&config, sink.clone()).unwrap();

        assert_eq!(summary.workers.len(), 3);
        let stat = summary.report.aggregate(OperationKind::Stat);
        assert_eq!(stat.attempts, 3 * 100 + 3);
        assert_eq!(stat.fails, 0);
        assert_eq!(summary.tail.map(|t| t.samples), Some(300));
        assert_eq!(sink.tail_reports().len(), 1);
    }

    #[test]
    fn test_local_backend_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = memory_config(2);
        config.client.backend = BackendType::Local;
        config.client.root = Some(dir.path().to_path_buf());
        config.workload.script = WorkloadScript::Lifecycle;
        config.workload.count = 5;

        let summary = run_benchmark(&config, Arc::new(CollectingSink::new())).unwrap();
        assert!(summary.workers.iter().all(|w| w.failures == 0));
        // Lifecycle removes everything it created
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_worker_error_is_reported() {
        let config = Config {
            workload: crate::config::WorkloadConfig {
                script: WorkloadScript::PrivateMkdir,
                count: 2,
                ..Default::default()
            },
            ..memory_config(2)
        };
        let good = MockClient::new();
        let bad = MockClient::new();
        bad.fail_on(OperationKind::MakeDir, "/mdpulse.1", Errno::EIO);

        let result = run_workers(&config, vec![good.clone(), bad], Arc::new(CollectingSink::new()));
        assert!(result.is_err());
        assert!(good.exists("/mdpulse.0/dir-1"));
    }
}
