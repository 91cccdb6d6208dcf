//! fleetd — the FleetGrid daemon.
//!
//! Single binary that assembles the FleetGrid subsystems:
//! - State store (redb)
//! - Cluster control client
//! - Worker registry + periodic sweep
//! - Deploy orchestrator
//! - REST API
//!
//! # Usage
//!
//! ```text
//! fleetd --config /etc/fleetgrid/fleetd.toml serve --port 8443
//! fleetd --config /etc/fleetgrid/fleetd.toml sweep
//! fleetd --config /etc/fleetgrid/fleetd.toml token --name ci
//! ```

mod config;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::Config;

const DEFAULT_LOG_FILTER: &str = "info,fleetd=debug,fleetgrid=debug";

#[derive(Parser)]
#[command(name = "fleetd", about = "FleetGrid daemon")]
struct Cli {
    /// Path to fleetd.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the API and sweep the registry in the background.
    Serve {
        /// Port to listen on.
        #[arg(long)]
        port: Option<u16>,

        /// Data directory for persistent state.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Run one registry sweep and exit.
    Sweep {
        /// Data directory for persistent state.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Print a signed auth token for a configured token name.
    Token {
        #[arg(long)]
        name: String,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { port, data_dir } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.server.data_dir = data_dir;
            }
            serve::run_serve(config).await
        }
        Command::Sweep { data_dir } => {
            if let Some(data_dir) = data_dir {
                config.server.data_dir = data_dir;
            }
            serve::run_sweep(config)
        }
        Command::Token { name } => serve::run_token(config, &name),
    }
}
