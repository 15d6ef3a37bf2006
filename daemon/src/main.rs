//! Liquid daemon: entry point for running a voting node.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use liquid_node::{LiquidNode, NodeConfig, ResolveRequest};
use liquid_rpc::{RpcServer, RpcState};
use liquid_types::ProposalId;
use liquid_utils::{format_duration, init_logging, LogFormat};

#[derive(Parser, Debug)]
#[command(name = "liquid-daemon", about = "Liquid-democracy voting node daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "LIQUID_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the LMDB environment.
    #[arg(long, env = "LIQUID_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "LIQUID_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output: "human" or "json".
    #[arg(long, env = "LIQUID_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Admin RPC port.
    #[arg(long, env = "LIQUID_RPC_PORT")]
    rpc_port: Option<u16>,

    /// Do not start the admin RPC server.
    #[arg(long, env = "LIQUID_DISABLE_RPC")]
    no_rpc: bool,

    /// Do not expose `/metrics`.
    #[arg(long, env = "LIQUID_DISABLE_METRICS")]
    no_metrics: bool,

    /// Seconds between deadline sweeps.
    #[arg(long, env = "LIQUID_SWEEP_INTERVAL_SECS")]
    sweep_interval_secs: Option<u64>,

    /// Seconds between hourly backup snapshots.
    #[arg(long, env = "LIQUID_BACKUP_INTERVAL_SECS")]
    backup_interval_secs: Option<u64>,

    /// Upper bound on a single storage call, in milliseconds.
    #[arg(long, env = "LIQUID_STORE_TIMEOUT_MS")]
    store_timeout_ms: Option<u64>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug, PartialEq)]
enum Command {
    /// Run the node until SIGINT/SIGTERM.
    Run,
    /// Resolve a closed proposal now.
    Resolve {
        proposal: u64,
        /// Overwrite an existing resolution.
        #[arg(long)]
        force: bool,
    },
    /// Take a manual backup snapshot of a proposal.
    Snapshot { proposal: u64 },
    /// Print the effective configuration as TOML.
    Config,
}

/// File settings (or defaults) overridden by whatever flags/env vars were given.
fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(path)
            .with_context(|| format!("loading config file {}", path.display()))?,
        None => NodeConfig::default(),
    };

    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(port) = cli.rpc_port {
        config.rpc_port = port;
    }
    if cli.no_rpc {
        config.enable_rpc = false;
    }
    if cli.no_metrics {
        config.enable_metrics = false;
    }
    if let Some(secs) = cli.sweep_interval_secs {
        config.sweep_interval_secs = secs;
    }
    if let Some(secs) = cli.backup_interval_secs {
        config.backup_interval_secs = secs;
    }
    if let Some(ms) = cli.store_timeout_ms {
        config.store_timeout_ms = ms;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(config: NodeConfig) -> anyhow::Result<()> {
    tracing::info!(
        data_dir = %config.data_dir.display(),
        rpc = %if config.enable_rpc { config.rpc_port.to_string() } else { "off".into() },
        sweep_every = %format_duration(config.sweep_interval_secs),
        backup_every = %format_duration(config.backup_interval_secs),
        "starting liquid node"
    );

    let mut node = LiquidNode::open(config.clone()).context("opening node")?;
    node.start();

    let rpc = if config.enable_rpc {
        let server = RpcServer::new(
            config.rpc_port,
            config.enable_metrics,
            RpcState::from_node(&node),
        );
        Some(tokio::spawn(server.start(node.shutdown.subscribe())))
    } else {
        None
    };

    node.shutdown.wait_for_signal().await;
    tracing::info!("shutdown signal received, stopping node");
    node.stop().await?;

    if let Some(handle) = rpc {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "rpc server exited with error"),
            Err(e) => tracing::warn!(error = %e, "rpc task ended abnormally"),
        }
    }

    tracing::info!("liquid daemon exited cleanly");
    Ok(())
}

async fn resolve(config: NodeConfig, proposal: u64, force: bool) -> anyhow::Result<()> {
    let node = LiquidNode::open(config).context("opening node")?;
    let outcome = node
        .resolution
        .resolve(ProposalId::new(proposal), ResolveRequest::admin(force))
        .await
        .with_context(|| format!("resolving proposal {proposal}"))?;
    println!("{}", serde_json::to_string_pretty(&outcome.tally)?);
    tracing::info!(
        proposal,
        status = outcome.audit.status.as_str(),
        duration_ms = outcome.audit.duration_ms,
        "resolution committed"
    );
    Ok(())
}

async fn snapshot(config: NodeConfig, proposal: u64) -> anyhow::Result<()> {
    let node = LiquidNode::open(config).context("opening node")?;
    let snapshot = node
        .backup
        .manual(ProposalId::new(proposal))
        .await
        .with_context(|| format!("snapshotting proposal {proposal}"))?;
    println!(
        "snapshot {} of proposal {} ({} participants)",
        snapshot.sequence,
        proposal,
        snapshot.actions.len()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if cli.command == Command::Config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    init_logging(config.log_format, &config.log_level);

    match cli.command {
        Command::Run => run(config).await,
        Command::Resolve { proposal, force } => resolve(config, proposal, force).await,
        Command::Snapshot { proposal } => snapshot(config, proposal).await,
        Command::Config => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "liquid-daemon",
            "--data-dir",
            "/tmp/liquid",
            "--rpc-port",
            "9000",
            "--no-metrics",
            "--log-format",
            "json",
            "run",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/liquid"));
        assert_eq!(config.rpc_port, 9000);
        assert!(!config.enable_metrics);
        assert!(config.enable_rpc);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(cli.command, Command::Run);
    }

    #[test]
    fn resolve_subcommand_parses_force() {
        let cli = Cli::try_parse_from(["liquid-daemon", "resolve", "7", "--force"]).unwrap();
        assert_eq!(cli.command, Command::Resolve { proposal: 7, force: true });
    }

    #[test]
    fn zero_interval_is_rejected() {
        let cli = Cli::try_parse_from(["liquid-daemon", "--sweep-interval-secs", "0", "config"]).unwrap();
        assert!(load_config(&cli).is_err());
    }
}
