//! # Persistence Node
//!
//! Opens the configured databases and caches, reports readiness, then waits
//! for SIGINT / SIGTERM and closes every handle within the grace period.
//! Useful as a connectivity probe for a deployment's persistence settings.

use anyhow::{Context, Result};
use clap::Parser;
use persistence_core::config::ConfigManager;
use persistence_core::constants;
use persistence_core::logging::init_tracing;
use persistence_core::registry::{CacheId, DatabaseId, PersistenceRegistry, RegistryOptions};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "persistence-node")]
#[command(about = "Open the configured persistence handles and hold them until shutdown")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// TOML file layered under the environment
    #[arg(short, long, env = "PERSISTENCE_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Databases to open (app, cms)
    #[arg(long, value_delimiter = ',', default_values_t = DatabaseId::ALL)]
    databases: Vec<DatabaseId>,

    /// Caches to open (global, app, cms)
    #[arg(long, value_delimiter = ',', default_values_t = CacheId::ALL)]
    caches: Vec<CacheId>,

    /// Application name reported to the document store
    #[arg(long, env = "APP_NAME")]
    app_name: Option<String>,

    /// Seconds allowed for closing handles on shutdown
    #[arg(long, env = "SHUTDOWN_GRACE_SECONDS", default_value_t = constants::SHUTDOWN_GRACE_PERIOD.as_secs())]
    shutdown_grace_seconds: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(cli).await {
        error!(error = ?e, "❌ persistence-node failed");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let manager = match &cli.config {
        Some(path) => {
            let env: HashMap<String, String> = std::env::vars().collect();
            ConfigManager::from_sources(Some(path.as_path()), &env)
        }
        None => ConfigManager::load(),
    }
    .context("loading persistence configuration")?;

    info!(
        environment = manager.environment().as_str(),
        config_file = ?manager.source_file(),
        "Configuration loaded"
    );

    let mut options = RegistryOptions::default()
        .databases(cli.databases.iter().copied())
        .caches(cli.caches.iter().copied());
    if let Some(app_name) = cli.app_name.clone() {
        options = options.app_name(app_name);
    }

    let registry = PersistenceRegistry::initialize(manager.config(), options)
        .await
        .context("opening persistence handles")?;

    info!("🚀 Persistence node ready, press Ctrl+C to stop");
    wait_for_shutdown_signal().await?;

    let report = registry
        .shutdown(Duration::from_secs(cli.shutdown_grace_seconds))
        .await;
    if report.is_clean() {
        info!(report = %report, "✅ Shutdown complete");
    } else {
        for (handle, e) in &report.failed {
            warn!(handle = %handle, error = %e, "Handle did not close cleanly");
        }
        anyhow::bail!("unclean shutdown: {report}");
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("listening for SIGINT")?,
        _ = terminate.recv() => {}
    }
    info!("🛑 Shutdown signal received");
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl+C")?;
    info!("🛑 Shutdown signal received");
    Ok(())
}
