//! Vortex server binary.

use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use vortex_server::{ServerConfig, run_with_shutdown};

/// Vortex cart link server
#[derive(Parser)]
#[command(name = "vortex-server")]
#[command(about = "HTTP server for shareable cart links")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address (overrides the config file)
    #[arg(short, long)]
    listen: Option<String>,

    /// Log level (defaults to the configured level)
    #[arg(long)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

fn load_config(args: &Args) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config from {path}: {e}"))?,
        None => ServerConfig::default(),
    };
    config.apply_env()?;

    if let Some(listen) = &args.listen {
        config.listen_addr = listen.clone();
    }
    Ok(config)
}

async fn shutdown_signal(shutdown_timeout: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown (timeout: {}s)...", shutdown_timeout);
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown (timeout: {}s)...", shutdown_timeout);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            // Logging is configured from the config, so fall back to defaults here.
            setup_logging("info", args.json_logs);
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let json = args.json_logs || config.logging.format == "json";
    setup_logging(&level, json);

    info!("Graceful shutdown timeout: {}s", config.shutdown_timeout);
    info!("Press Ctrl+C to stop");

    let shutdown_timeout = config.shutdown_timeout;
    let shutdown = shutdown_signal(shutdown_timeout);

    if let Err(e) = run_with_shutdown(config, shutdown).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}
