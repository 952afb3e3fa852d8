//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Run the benchmark workers (default)
    Bench,
    /// Run the metadata handler behind the request channel
    Serve,
}

/// mdpulse - metadata benchmark and interception toolkit
#[derive(Parser, Debug)]
#[command(name = "mdpulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: bench or serve
    #[arg(long, value_enum, default_value = "bench")]
    pub mode: ExecutionMode,

    // === Workload Options ===
    /// Workload script
    #[arg(long, value_enum)]
    pub script: Option<ScriptType>,

    /// Number of worker threads
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Files, directories or stats per worker, depending on the script
    #[arg(short = 'n', long)]
    pub count: Option<u64>,

    /// Path depth (nested directory levels + leaf)
    #[arg(long)]
    pub depth: Option<usize>,

    /// Stats per worker in the stat phase
    #[arg(long)]
    pub stat_count: Option<u64>,

    /// Keys populated by the skewed_stat script
    #[arg(long)]
    pub universe: Option<u64>,

    /// Namespace directory name (workers use /<base>.<id>)
    #[arg(long)]
    pub base_name: Option<String>,

    // === Distribution Options ===
    /// Key access pattern for stat phases
    #[arg(long, value_enum)]
    pub distribution: Option<DistributionType>,

    /// Zipf exponent (must be > 0)
    #[arg(long, default_value = "0.99")]
    pub zipf_alpha: f64,

    /// Base seed for key samplers (entropy when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    // === Throttle Options ===
    /// Pacing delay before each operation (e.g. 50us, 1ms)
    #[arg(long)]
    pub throttle: Option<String>,

    /// Throttle mode: sleep or spin
    #[arg(long, value_enum, default_value = "sleep")]
    pub throttle_mode: ThrottleModeArg,

    // === Statistics Options ===
    /// Operations between throughput reports
    #[arg(long)]
    pub report_interval: Option<u64>,

    /// Worker slot cap of the statistics arena
    #[arg(long)]
    pub max_workers: Option<usize>,

    // === Client Options ===
    /// Metadata client backend
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Namespace root directory (local backend and serve mode)
    #[arg(long)]
    pub root: Option<PathBuf>,

    // === Channel Options ===
    /// Mount prefix redirected by the interception shim
    #[arg(long)]
    pub mount: Option<String>,

    /// Request queue name
    #[arg(long)]
    pub request_queue: Option<String>,

    /// Response queue name prefix
    #[arg(long)]
    pub response_prefix: Option<String>,

    /// Messages each queue holds
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Response queues created by the handler
    #[arg(long)]
    pub max_clients: Option<usize>,

    /// Stop serving after this many requests (serve mode)
    #[arg(long)]
    pub serve_count: Option<u64>,

    // === Output Options ===
    /// JSON summary file path
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Print a row per worker in throughput reports
    #[arg(long)]
    pub per_worker: bool,

    // === Configuration File ===
    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Dry run - validate configuration without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Workload script
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ScriptType {
    /// Nested mkdir + create, then stats
    NestedCreateStat,
    /// mkdir, create, unlink, rmdir
    Lifecycle,
    /// Private sibling directories
    PrivateMkdir,
    /// Deep key paths with skewed stats
    SkewedStat,
}

/// Key access pattern
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DistributionType {
    /// Sweep keys in order
    Sequential,
    /// Uniform random keys
    Uniform,
    /// Zipf distribution (power law)
    Zipf,
}

/// Throttle mode
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ThrottleModeArg {
    /// Sleep (yield CPU)
    Sleep,
    /// Spin (busy-wait)
    Spin,
}

/// Metadata client backend
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Backend {
    /// Local directory
    Local,
    /// Remote handler over POSIX message queues
    Remote,
    /// In-memory namespace
    Memory,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.threads == Some(0) {
            anyhow::bail!("threads must be at least 1");
        }
        if matches!(self.distribution, Some(DistributionType::Zipf))
            && !(self.zipf_alpha.is_finite() && self.zipf_alpha > 0.0)
        {
            anyhow::bail!("zipf_alpha must be a finite value > 0");
        }
        if self.mode == ExecutionMode::Serve && self.serve_count == Some(0) {
            anyhow::bail!("serve_count must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bench_flags() {
        let cli = Cli::try_parse_from([
            "mdpulse",
            "--script",
            "skewed-stat",
            "-t",
            "8",
            "--distribution",
            "zipf",
            "--zipf-alpha",
            "1.1",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.mode, ExecutionMode::Bench);
        assert!(matches!(cli.script, Some(ScriptType::SkewedStat)));
        assert_eq!(cli.threads, Some(8));
        assert_eq!(cli.verbose, 2);
        cli.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_alpha() {
        let cli = Cli::try_parse_from(["mdpulse", "--distribution", "zipf", "--zipf-alpha", "0"]).unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_threads() {
        let cli = Cli::try_parse_from(["mdpulse", "--threads", "0"]).unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_parse_serve_mode() {
        let cli = Cli::try_parse_from(["mdpulse", "--mode", "serve", "--root", "/tmp/ns"]).unwrap();
        assert_eq!(cli.mode, ExecutionMode::Serve);
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/ns")));
    }
}
