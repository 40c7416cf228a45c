//! # liftoff
//!
//! Launch coordinator binary: loads settings, initializes logging and
//! metrics, then serves the WebSocket coordinator until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use liftoff_logging::LogLevel;
use liftoff_server::{LaunchServer, ServerConfig};
use liftoff_settings::{LaunchSettings, LogFormat};

/// Time allowed for peers and the coordinator to wind down on Ctrl-C.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Launch coordination server.
#[derive(Parser, Debug)]
#[command(name = "liftoff", about = "Shared launch coordination server", version)]
struct Cli {
    /// Settings file (defaults to `$LIFTOFF_CONFIG` or `~/.liftoff/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Distinct participants needed to launch.
    #[arg(long)]
    threshold: Option<u32>,

    /// Require this token on `reset` and `reveal_now`.
    #[arg(long)]
    admin_token: Option<String>,

    /// Log level (`trace`, `debug`, `info`, `warn`, `error`).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Command-line flags win over every other settings layer.
    fn apply_to(&self, settings: &mut LaunchSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(threshold) = self.threshold {
            settings.session.threshold = threshold;
        }
        if let Some(token) = &self.admin_token {
            settings.access.admin_token = Some(token.clone());
        }
        if let Some(level) = &self.log_level {
            settings.logging.level = LogLevel::from_str_lossy(level).to_string();
        }
        if self.json_logs {
            settings.logging.format = LogFormat::Json;
        }
    }
}

fn load(cli: &Cli) -> Result<LaunchSettings> {
    let mut settings = match &cli.config {
        Some(path) => liftoff_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => liftoff_settings::load_settings().context("Failed to load settings")?,
    };
    cli.apply_to(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = load(&args)?;

    liftoff_logging::init_subscriber(
        &settings.logging.level,
        settings.logging.format == LogFormat::Json,
    )
    .context("Failed to initialize logging")?;

    let metrics = liftoff_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let config = ServerConfig::from_settings(&settings).context("Invalid server configuration")?;
    let server = LaunchServer::new(config, metrics);

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("liftoff listening on ws://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("shutting down");
    server.shutdown_gracefully(handle, Some(SHUTDOWN_TIMEOUT)).await;
    tracing::info!("shutdown complete");
    Ok(())
}
