//! TOML configuration file parsing

use super::cli_convert::*;
use super::*;
use crate::config::cli::Cli;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents).context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
///
/// Only flags that were actually given override the file.
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    // Workload
    if let Some(script) = cli.script {
        config.workload.script = convert_script(script);
    }
    if let Some(count) = cli.count {
        config.workload.count = count;
    }
    if let Some(depth) = cli.depth {
        config.workload.depth = depth;
    }
    if let Some(stat_count) = cli.stat_count {
        config.workload.stat_count = stat_count;
    }
    if let Some(universe) = cli.universe {
        config.workload.universe = universe;
    }
    if let Some(ref base) = cli.base_name {
        config.workload.base_name = base.clone();
    }
    if let Some(dist) = cli.distribution {
        config.workload.access = convert_distribution(dist, cli.zipf_alpha);
    }
    if let Some(ref throttle) = cli.throttle {
        config.workload.throttle = Some(ThrottleConfig {
            delay_us: parse_time_us(throttle)?,
            mode: convert_throttle_mode(cli.throttle_mode),
        });
    }

    // Workers
    if let Some(threads) = cli.threads {
        config.workers.threads = threads;
    }
    if let Some(max) = cli.max_workers {
        config.workers.max_workers = max;
    }
    if let Some(seed) = cli.seed {
        config.workers.seed = Some(seed);
    }
    if let Some(interval) = cli.report_interval {
        config.workers.report_interval = interval;
    }

    // Client
    if let Some(backend) = cli.backend {
        config.client.backend = convert_backend(backend);
    }
    if let Some(ref root) = cli.root {
        config.client.root = Some(root.clone());
    }

    // Channel
    if let Some(ref mount) = cli.mount {
        config.channel.mount = mount.clone();
    }
    if let Some(ref name) = cli.request_queue {
        config.channel.request_queue = name.clone();
    }
    if let Some(ref prefix) = cli.response_prefix {
        config.channel.response_prefix = prefix.clone();
    }
    if let Some(capacity) = cli.queue_capacity {
        config.channel.queue_capacity = capacity;
    }
    if let Some(max) = cli.max_clients {
        config.channel.max_clients = max;
    }

    // Output
    if let Some(ref path) = cli.json_output {
        config.output.json_output = Some(path.clone());
    }
    if cli.per_worker {
        config.output.per_worker = true;
    }

    // Runtime
    if cli.dry_run {
        config.runtime.dry_run = true;
    }
    if cli.debug {
        config.runtime.debug = true;
    }

    Ok(config)
}

/// Build the run configuration from the CLI, loading `--config` first if given
pub fn load_config(cli: &Cli) -> Result<Config> {
    let base = match cli.config {
        Some(ref path) => parse_toml_file(path)?,
        None => Config::default(),
    };
    merge_cli_with_config(cli, base)
}
