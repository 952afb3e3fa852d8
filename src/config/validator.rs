//! Configuration validation

use super::*;
use crate::protocol::MD_PATH_MAX;
use crate::worker::layout::longest_path_len;
use anyhow::Result;
use tracing::warn;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_workload(&config.workload)?;
    validate_workers(&config.workers)?;
    validate_client(&config.client)?;
    validate_channel(&config.channel)?;
    validate_paths(config)?;

    if config.client.backend == BackendType::Remote && config.workers.threads > config.channel.max_clients {
        anyhow::bail!(
            "remote backend needs one response queue per worker: threads ({}) > channel.max_clients ({})",
            config.workers.threads,
            config.channel.max_clients
        );
    }

    Ok(())
}

/// Validate workload configuration
pub fn validate_workload(workload: &WorkloadConfig) -> Result<()> {
    if workload.count == 0 {
        anyhow::bail!("workload.count must be at least 1");
    }

    match workload.script {
        WorkloadScript::NestedCreateStat | WorkloadScript::Lifecycle if workload.depth < 2 => {
            anyhow::bail!(
                "workload.depth must be at least 2 for {} (namespace + file), got {}",
                workload.script,
                workload.depth
            );
        }
        WorkloadScript::SkewedStat if workload.universe == 0 => {
            anyhow::bail!("workload.universe must be at least 1 for skewed_stat");
        }
        _ => {}
    }

    if workload.base_name.is_empty() || workload.base_name.contains('/') {
        anyhow::bail!("workload.base_name must be a non-empty name without '/', got {:?}", workload.base_name);
    }

    validate_access(&workload.access)?;

    if let Some(ref throttle) = workload.throttle {
        validate_throttle(throttle)?;
    }

    Ok(())
}

fn validate_access(access: &AccessPattern) -> Result<()> {
    if let AccessPattern::Zipf { alpha } = access {
        if !alpha.is_finite() || *alpha <= 0.0 {
            anyhow::bail!("zipf alpha must be a finite value > 0, got {}", alpha);
        }
    }
    Ok(())
}

fn validate_throttle(throttle: &ThrottleConfig) -> Result<()> {
    if throttle.delay_us > 1_000_000 {
        anyhow::bail!(
            "throttle delay must be at most 1 second (1,000,000 us), got {}",
            throttle.delay_us
        );
    }
    Ok(())
}

/// Validate workers configuration
pub fn validate_workers(workers: &WorkerConfig) -> Result<()> {
    if workers.threads == 0 {
        anyhow::bail!("workers.threads must be at least 1");
    }
    if workers.max_workers == 0 {
        anyhow::bail!("workers.max_workers must be at least 1");
    }
    if workers.threads > workers.max_workers {
        anyhow::bail!(
            "workers.threads ({}) exceeds the worker slot cap ({})",
            workers.threads,
            workers.max_workers
        );
    }
    if workers.report_interval == 0 {
        anyhow::bail!("workers.report_interval must be at least 1");
    }
    let cpus = num_cpus::get();
    if workers.threads > cpus * 4 {
        eprintln!(
            "Warning: Very high thread count ({}) for {} CPUs, latencies will include scheduling delay",
            workers.threads, cpus
        );
    }
    if workers.sampled_kinds.is_empty() {
        warn!("no sampled operation kinds; the tail latency report will be empty");
    }

    Ok(())
}

/// Validate client configuration
pub fn validate_client(client: &ClientConfig) -> Result<()> {
    if client.backend == BackendType::Local && client.root.is_none() {
        anyhow::bail!("local backend requires a namespace root (--root)");
    }
    Ok(())
}

/// Validate channel configuration
pub fn validate_channel(channel: &ChannelConfig) -> Result<()> {
    for name in [&channel.request_queue, &channel.response_prefix] {
        if !name.starts_with('/') || name[1..].contains('/') {
            anyhow::bail!("queue name {:?} must start with '/' and contain no other '/'", name);
        }
    }
    if channel.queue_capacity == 0 {
        anyhow::bail!("channel.queue_capacity must be at least 1");
    }
    if channel.max_clients == 0 {
        anyhow::bail!("channel.max_clients must be at least 1");
    }
    if !channel.mount.starts_with('/') || channel.mount.len() < 2 || channel.mount.ends_with('/') {
        anyhow::bail!("mount prefix {:?} must be an absolute path without a trailing '/'", channel.mount);
    }
    Ok(())
}

/// Check the longest path the workload will build against the wire bound
pub fn validate_paths(config: &Config) -> Result<()> {
    let longest = longest_path_len(&config.workload, config.workers.threads);
    if longest > MD_PATH_MAX {
        anyhow::bail!(
            "{} builds paths of up to {} bytes, the limit is {} (lower depth or count)",
            config.workload.script,
            longest,
            MD_PATH_MAX
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> Config {
        let mut config = Config::default();
        config.client.backend = BackendType::Memory;
        config
    }

    #[test]
    fn test_default_memory_config_is_valid() {
        validate_config(&memory_config()).unwrap();
    }

    #[test]
    fn test_local_backend_needs_root() {
        let config = Config::default();
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.client.root = Some("/tmp".into());
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_rejects_zero_workers_and_cap() {
        let mut config = memory_config();
        config.workers.threads = 0;
        assert!(validate_config(&config).is_err());

        let mut config = memory_config();
        config.workers.threads = 300;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_report_interval() {
        let mut config = memory_config();
        config.workers.report_interval = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_bad_alpha() {
        let mut config = memory_config();
        config.workload.access = AccessPattern::Zipf { alpha: -1.0 };
        assert!(validate_config(&config).is_err());
        config.workload.access = AccessPattern::Zipf { alpha: 0.99 };
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_rejects_paths_over_wire_bound() {
        let mut config = memory_config();
        config.workload.depth = 100;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_remote_needs_queue_per_worker() {
        let mut config = Config::default();
        config.client.backend = BackendType::Remote;
        config.channel.max_clients = 2;
        config.workers.threads = 3;
        assert!(validate_config(&config).is_err());
        config.workers.threads = 2;
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_rejects_bad_queue_names() {
        let mut channel = ChannelConfig::default();
        channel.request_queue = "no_slash".to_string();
        assert!(validate_channel(&channel).is_err());

        let mut channel = ChannelConfig::default();
        channel.response_prefix = "/a/b".to_string();
        assert!(validate_channel(&channel).is_err());
    }

    #[test]
    fn test_rejects_depth_below_two() {
        let workload = WorkloadConfig { depth: 1, ..Default::default() };
        assert!(validate_workload(&workload).is_err());
        let workload = WorkloadConfig { depth: 1, script: WorkloadScript::PrivateMkdir, ..Default::default() };
        validate_workload(&workload).unwrap();
    }
}
