//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//!
//! A run is described by one [`Config`]. It can be loaded from a TOML file
//! (`-c/--config`) and is then overridden by any CLI flag that was given;
//! without a file the CLI alone builds it. [`validator::validate_config`]
//! checks every section before a worker starts.
//!
//! # Example
//!
//! ```
//! use mdpulse::config::toml::parse_toml_string;
//!
//! let config = parse_toml_string(r#"
//!     [workload]
//!     script = "skewed_stat"
//!     count = 5000
//!     universe = 200
//!     access = { type = "zipf", alpha = 0.99 }
//!
//!     [workers]
//!     threads = 4
//! "#).unwrap();
//! assert_eq!(config.workers.threads, 4);
//! ```

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;
pub mod workload;

use crate::channel::ChannelNames;
use crate::client::OperationKind;
use crate::distribution::AccessPattern;
use crate::stats::DEFAULT_MAX_WORKERS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use workload::*;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// What each worker does
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Script to run
    #[serde(default)]
    pub script: WorkloadScript,
    /// Files (or directories, or stats for skewed_stat) per worker
    #[serde(default = "default_count")]
    pub count: u64,
    /// Path depth: nested directory levels + the file
    #[serde(default = "default_depth")]
    pub depth: usize,
    /// Stats per worker in the stat phase of nested_create_stat
    #[serde(default = "default_stat_count")]
    pub stat_count: u64,
    /// Keys populated by skewed_stat
    #[serde(default = "default_universe")]
    pub universe: u64,
    /// Key selection for stat phases
    #[serde(default)]
    pub access: AccessPattern,
    /// Per-operation pacing delay
    pub throttle: Option<ThrottleConfig>,
    /// Name of the per-worker namespace directory (`/<base>.<worker_id>`)
    #[serde(default = "default_base_name")]
    pub base_name: String,
    /// Mode bits passed to mkdir and create
    #[serde(default = "default_mode")]
    pub mode: u32,
}

fn default_count() -> u64 {
    1000
}

fn default_depth() -> usize {
    4
}

fn default_stat_count() -> u64 {
    10_000
}

fn default_universe() -> u64 {
    1000
}

fn default_base_name() -> String {
    "mdpulse".to_string()
}

fn default_mode() -> u32 {
    0o777
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            script: WorkloadScript::default(),
            count: default_count(),
            depth: default_depth(),
            stat_count: default_stat_count(),
            universe: default_universe(),
            access: AccessPattern::default(),
            throttle: None,
            base_name: default_base_name(),
            mode: default_mode(),
        }
    }
}

impl WorkloadConfig {
    /// Number of keys the stat phase samples from
    pub fn key_universe(&self) -> u64 {
        match self.script {
            WorkloadScript::SkewedStat => self.universe,
            _ => self.count,
        }
    }
}

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of worker threads
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Worker slot cap of the statistics arena
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Base seed for key samplers (worker i uses seed + i)
    pub seed: Option<u64>,
    /// Operations between throughput reports
    #[serde(default = "default_report_interval")]
    pub report_interval: u64,
    /// Kinds whose raw latencies feed the tail report
    #[serde(default = "default_sampled_kinds")]
    pub sampled_kinds: Vec<OperationKind>,
}

fn default_threads() -> usize {
    1
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_report_interval() -> u64 {
    10_000
}

fn default_sampled_kinds() -> Vec<OperationKind> {
    vec![OperationKind::Stat]
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            max_workers: default_max_workers(),
            seed: None,
            report_interval: default_report_interval(),
            sampled_kinds: default_sampled_kinds(),
        }
    }
}

/// Metadata client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Client implementation
    #[serde(default)]
    pub backend: BackendType,
    /// Namespace root for the local backend (and for the serve mode handler)
    pub root: Option<PathBuf>,
}

/// Request channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Request queue name
    #[serde(default = "default_request_queue")]
    pub request_queue: String,
    /// Response queue name prefix (`<prefix><client_id>`)
    #[serde(default = "default_response_prefix")]
    pub response_prefix: String,
    /// Messages each queue holds
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Response queues the handler creates (client ids 0..max_clients)
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Mount prefix the interception shim redirects
    #[serde(default = "default_mount")]
    pub mount: String,
}

fn default_request_queue() -> String {
    ChannelNames::default().request
}

fn default_response_prefix() -> String {
    ChannelNames::default().response_prefix
}

fn default_queue_capacity() -> usize {
    10
}

fn default_max_clients() -> usize {
    64
}

fn default_mount() -> String {
    crate::shim::DEFAULT_MOUNT.to_string()
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            request_queue: default_request_queue(),
            response_prefix: default_response_prefix(),
            queue_capacity: default_queue_capacity(),
            max_clients: default_max_clients(),
            mount: default_mount(),
        }
    }
}

impl ChannelConfig {
    pub fn names(&self) -> ChannelNames {
        ChannelNames::new(self.request_queue.clone(), self.response_prefix.clone())
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON summary file path
    pub json_output: Option<PathBuf>,
    /// Print a row per worker in throughput reports
    #[serde(default)]
    pub per_worker: bool,
}

/// Runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Validate configuration and print it without running
    #[serde(default)]
    pub dry_run: bool,
    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    /// Validate the complete configuration
    pub fn validate(&self) -> crate::Result<()> {
        validator::validate_config(self)
    }
}

// Display trait implementations

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Workload: {}", self.workload)?;
        writeln!(f, "  Workers: {}", self.workers)?;
        writeln!(f, "  Client: {}", self.client)?;
        if self.client.backend == BackendType::Remote {
            writeln!(f, "  Channel: {}", self.channel)?;
        }
        writeln!(f, "  Output: {}", self.output)?;
        Ok(())
    }
}

impl fmt::Display for WorkloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, count={}, depth={}", self.script, self.count, self.depth)?;
        match self.script {
            WorkloadScript::NestedCreateStat => {
                write!(f, ", stat_count={}, access={}", self.stat_count, self.access)?
            }
            WorkloadScript::SkewedStat => {
                write!(f, ", universe={}, access={}", self.universe, self.access)?
            }
            WorkloadScript::Lifecycle | WorkloadScript::PrivateMkdir => {}
        }
        if let Some(ref throttle) = self.throttle {
            write!(f, ", throttle={}", throttle)?;
        }
        Ok(())
    }
}

impl fmt::Display for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} thread(s), report every {} ops", self.threads, self.report_interval)?;
        if let Some(seed) = self.seed {
            write!(f, ", seed={}", seed)?;
        }
        Ok(())
    }
}

impl fmt::Display for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.backend)?;
        if let Some(ref root) = self.root {
            write!(f, " at {}", root.display())?;
        }
        Ok(())
    }
}

impl fmt::Display for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {}<id>, capacity={}, max_clients={}",
            self.request_queue, self.response_prefix, self.queue_capacity, self.max_clients
        )
    }
}

impl fmt::Display for OutputConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.json_output {
            Some(ref path) => write!(f, "text + json={}", path.display()),
            None => write!(f, "text output"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.workload.script, WorkloadScript::NestedCreateStat);
        assert_eq!(config.workload.depth, 4);
        assert_eq!(config.workers.max_workers, 256);
        assert_eq!(config.workers.sampled_kinds, vec![OperationKind::Stat]);
        assert_eq!(config.channel.mount, "/ethane");
        assert_eq!(config.channel.names().response(2), "/mdpulse_resp_mq_2");
    }

    #[test]
    fn test_key_universe_follows_script() {
        let mut workload = WorkloadConfig { count: 10, universe: 99, ..Default::default() };
        assert_eq!(workload.key_universe(), 10);
        workload.script = WorkloadScript::SkewedStat;
        assert_eq!(workload.key_universe(), 99);
    }

    #[test]
    fn test_display_mentions_script() {
        let config = Config::default();
        let text = config.to_string();
        assert!(text.contains("nested_create_stat"));
        assert!(text.contains("1 thread(s)"));
    }
}
