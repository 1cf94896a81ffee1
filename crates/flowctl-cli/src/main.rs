// crates/flowctl-cli/src/main.rs
// ============================================================================
// Binary: flowctl
// Description: CLI entry point: argument parsing, tracing setup, component
//   wiring, and shutdown handling for the flowctl rule-reconciliation
//   controller.
// ============================================================================

//! # flowctl
//!
//! Wires together [`flowctl_config`], [`flowctl_store_sqlite`], and
//! [`flowctl_monitor`] into a running controller, or performs one-off
//! maintenance commands (`init-db`, `seed`) against the rule store.

#![forbid(unsafe_code)]

mod listener;
mod seed;
mod transport;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clap::Subcommand;
use flowctl_core::DatapathId;
use flowctl_monitor::SystemClock;
use flowctl_store_sqlite::SqliteRuleStore;
use flowctl_store_sqlite::SqliteStoreConfig;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use crate::listener::ChannelEventSource;
use crate::transport::TcpSwitchTransport;

/// Error surfaced to the process exit path.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] flowctl_config::ConfigError),
    #[error(transparent)]
    Store(#[from] flowctl_store_sqlite::SqliteStoreError),
    #[error(transparent)]
    Seed(#[from] seed::SeedError),
    #[error(transparent)]
    Listener(#[from] listener::ListenerError),
}

#[derive(Debug, Parser)]
#[command(name = "flowctl", about = "SDN rule-reconciliation controller")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs the controller: OpenFlow listener, session bootstrap, and the
    /// periodic reconciliation loop.
    Run {
        /// Path to the TOML configuration file.
        #[arg(long, default_value = "flowctl.toml")]
        config: PathBuf,
    },
    /// Creates the rule store's schema if it does not already exist.
    InitDb {
        /// Path to the SQLite database file.
        #[arg(long, default_value = "flowctl.db")]
        db_path: PathBuf,
    },
    /// Replaces a switch's desired rules from a JSON seed file.
    Seed {
        /// Path to the SQLite database file.
        #[arg(long, default_value = "flowctl.db")]
        db_path: PathBuf,
        /// Target switch's datapath id.
        #[arg(long)]
        dpid: u64,
        /// Path to the JSON rule seed file.
        #[arg(long)]
        rules_file: PathBuf,
    },
}

fn init_tracing(config: &flowctl_config::Config) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        flowctl_config::LogFormat::Json => subscriber.json().init(),
        flowctl_config::LogFormat::Text => subscriber.init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::InitDb { db_path } => {
            flowctl_store_sqlite::bootstrap_schema(&SqliteStoreConfig::new(db_path))?;
            report("schema ready".to_owned());
            Ok(())
        }
        Command::Seed { db_path, dpid, rules_file } => {
            let store = SqliteRuleStore::open(SqliteStoreConfig::new(db_path))?;
            let rules = seed::load_seed_file(&rules_file, DatapathId::new(dpid))?;
            store.replace_rules(DatapathId::new(dpid), &rules)?;
            report(format!("seeded {} rule(s) for dpid {dpid}", rules.len()));
            Ok(())
        }
        Command::Run { config } => run(config).await,
    }
}

/// Prints a one-line result for a maintenance subcommand.
///
/// Isolated from the rest of the binary, which reports everything else
/// through `tracing`, so the one sanctioned stdout write site is easy to
/// audit.
#[allow(clippy::print_stdout, reason = "maintenance subcommands report their result on stdout, not through tracing")]
fn report(message: String) {
    println!("{message}");
}

async fn run(config_path: PathBuf) -> Result<(), CliError> {
    let config = flowctl_config::Config::load(&config_path)?;
    init_tracing(&config);

    let store = SqliteRuleStore::open(SqliteStoreConfig::new(&config.db_path))?;
    let transport = TcpSwitchTransport::new();
    let shared = flowctl_monitor::Shared::new();
    let clock = SystemClock;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let listener_transport = transport.clone();
    let listener_addr = config.listen_addr.clone();
    let listener_task =
        tokio::spawn(async move { listener::run(&listener_addr, listener_transport, event_tx).await });

    let bootstrap_task = tokio::spawn(flowctl_monitor::bootstrap::run(
        ChannelEventSource::new(event_rx),
        shared.clone(),
        transport.clone(),
        store.clone(),
        clock,
    ));

    let monitor_task = tokio::spawn(flowctl_monitor::monitor::run(
        shared,
        transport,
        store,
        clock,
        Duration::from_secs(config.monitor_interval_secs),
        shutdown_rx,
    ));

    #[allow(clippy::expect_used, reason = "ctrl-c registration failing means the process has no way to shut down cleanly")]
    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = monitor_task.await;
    bootstrap_task.abort();
    listener_task.abort();

    Ok(())
}
