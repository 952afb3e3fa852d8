//! mdpulse CLI entry point

use anyhow::{Context, Result};
use mdpulse::config::cli::{Cli, ExecutionMode};
use mdpulse::config::toml::load_config;
use mdpulse::config::Config;
use mdpulse::coordinator;
use mdpulse::output::json::{write_json_output, BenchmarkSummary};
use mdpulse::output::text;
use mdpulse::stats::recorder::ConsoleSink;
use std::sync::Arc;
use tracing::info;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(&cli);
    cli.validate()?;

    println!("mdpulse v{}", env!("CARGO_PKG_VERSION"));
    println!("Metadata benchmark and interception toolkit");
    println!();

    match cli.mode {
        ExecutionMode::Bench => run_bench(&cli),
        ExecutionMode::Serve => run_serve(&cli),
    }
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins when set; otherwise the level follows `-v` (`--debug`
/// implies at least debug).
fn init_logging(cli: &Cli) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = match (cli.verbose, cli.debug) {
        (0, false) => "warn",
        (1, false) => "info",
        (0..=2, _) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mdpulse={}", level)));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn build_config(cli: &Cli) -> Result<Config> {
    let config = load_config(cli)?;
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

/// Run the benchmark workers
fn run_bench(cli: &Cli) -> Result<()> {
    let config = build_config(cli)?;
    print!("{}", config);

    if config.runtime.dry_run {
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    println!();
    println!("Starting benchmark...");
    println!();

    let summary = coordinator::run_benchmark(&config, Arc::new(ConsoleSink))?;

    println!();
    text::print_results(&summary, &config);

    if let Some(ref path) = config.output.json_output {
        let document = BenchmarkSummary::build(&summary, &config);
        write_json_output(path, &document, true)?;
        println!("JSON summary written to {}", path.display());
    }
    Ok(())
}

/// Run the metadata handler behind the request channel
#[cfg(target_os = "linux")]
fn run_serve(cli: &Cli) -> Result<()> {
    use mdpulse::channel::mqueue::MqServer;
    use mdpulse::client::local::LocalClient;
    use mdpulse::server::MetadataServer;

    let config = build_config(cli)?;
    let root = config
        .client
        .root
        .clone()
        .context("Serve mode requires a namespace root (--root)")?;
    let channel = &config.channel;
    let names = channel.names();

    println!("Serving {} over {} / {}<id>", root.display(), names.request, names.response_prefix);
    println!("  Max clients: {}", channel.max_clients);
    println!("  Mount prefix for clients: {}", channel.mount);

    if config.runtime.dry_run {
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }

    std::fs::create_dir_all(&root)
        .with_context(|| format!("Failed to create namespace root: {}", root.display()))?;
    let transport = MqServer::create(&names, channel.queue_capacity, channel.queue_capacity, channel.max_clients)
        .context("Failed to create message queues")?;
    let mut server = MetadataServer::new(transport, LocalClient::new(root), channel.max_clients);

    match cli.serve_count {
        Some(n) => {
            server.serve_n(n)?;
            info!(handled = server.handled(), dropped = server.dropped(), "served requested count");
        }
        None => server.serve_forever()?,
    }
    println!("Served {} requests ({} dropped)", server.handled(), server.dropped());
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn run_serve(_cli: &Cli) -> Result<()> {
    anyhow::bail!("serve mode requires POSIX message queues (Linux)")
}
