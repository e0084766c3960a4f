mod checks;
mod config;
mod validation;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use vigil::{CheckEngine, LogSink};

use crate::config::Config;

/// Runs the configured health checks and logs every result.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the checks file (defaults to $XDG_CONFIG_HOME/vigil/checks.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Load and validate the configuration, print it and exit
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init().context("failed to initialise logging")?;

    let config = Config::from_config(cli.config.as_ref()).context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    if cli.dry_run {
        println!("{}", config);
        return Ok(());
    }

    let bindings = config
        .checks
        .iter()
        .map(checks::build_binding)
        .collect::<Result<Vec<_>>>()?;

    let mut engine = CheckEngine::new(Arc::new(LogSink));
    engine.register_all(bindings).context("failed to schedule checks")?;

    if engine.is_empty() {
        warn!("No checks configured, nothing will be probed");
    }
    info!("Vigil running with {} check(s)", engine.len());

    shutdown_signal().await;
    info!("Shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
