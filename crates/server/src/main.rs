//! blockd server binary.

use anyhow::{Context, Result};
use blockd_core::config::AppConfig;
use blockd_server::metrics::metrics_router;
use blockd_server::server::Fault;
use blockd_server::stats::StatsSampler;
use blockd_server::{AppState, HttpService, Service, Stack, create_router};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// blockd - a verified block storage node
#[derive(Parser, Debug)]
#[command(name = "blockd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "BLOCKD_CONFIG",
        default_value = "config/blockd.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("blockd v{}", env!("CARGO_PKG_VERSION"));

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = ?e, "blockd failed");
            ExitCode::FAILURE
        }
    }
}

/// Load configuration. The file is optional; `BLOCKD_` variables override it.
fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if std::path::Path::new(path).exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(config_path = %path, "No config file found, using defaults and environment");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("BLOCKD_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;
    Ok(config)
}

/// Run the node until a shutdown signal or a fatal fault.
///
/// Returns whether every step, including shutdown, was clean.
async fn run(args: Args) -> Result<bool> {
    let config = load_config(&args.config)?;

    blockd_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let storage = blockd_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend ready");

    let state = AppState::new(&config, storage);

    let mut services: Vec<Box<dyn Service>> = Vec::new();
    if config.stats.enabled {
        services.push(Box::new(StatsSampler::from_config(&config.stats)));
    }
    if let Some(bind) = &config.metrics.bind {
        services.push(Box::new(HttpService::new("metrics", bind, metrics_router())));
    }
    services.push(Box::new(HttpService::new(
        "blocks",
        &config.server.bind,
        create_router(state),
    )));

    let mut stack = Stack::new(services);
    let (fault_tx, mut faults) = mpsc::unbounded_channel();
    stack
        .start(fault_tx)
        .await
        .context("failed to start services")?;

    let mut clean = true;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            fault = faults.recv() => match fault {
                Some(fault @ Fault::Recovered { .. }) => {
                    tracing::warn!(fault = %fault, "Recovered request fault");
                }
                Some(fault @ Fault::Accept { .. }) => {
                    tracing::error!(fault = %fault, "Server stopped accepting, shutting down");
                    clean = false;
                    break;
                }
                None => break,
            },
        }
    }

    tracing::info!("Shutting down");
    if let Err(e) = stack.stop().await {
        tracing::error!(error = %e, "Shutdown was not clean");
        clean = false;
    }
    tracing::info!(clean, "Shutdown complete");
    Ok(clean)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT"),
        () = terminate => tracing::info!("Received SIGTERM"),
    }
}
