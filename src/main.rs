//! Paperless exporter binary entry point.
//!
//! Core functionality is provided by the `paperless_exporter` library crate.

use clap::Parser;
use paperless_exporter::{
    Exporter, Orchestrator, PaperlessClient, build_sources,
    config::{AppConfig, parse_duration},
    exporter_registry,
    server::{AppState, create_router},
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prometheus exporter for Paperless-ngx
#[derive(Parser, Debug)]
#[command(name = "paperless-exporter", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "PAPERLESS_EXPORTER_CONFIG")]
    config: Option<PathBuf>,

    /// Server bind address (overrides config file)
    #[arg(long, env = "PAPERLESS_EXPORTER_SERVER_BIND")]
    server_bind: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, env = "PAPERLESS_EXPORTER_SERVER_PORT")]
    server_port: Option<u16>,

    /// Path under which to expose metrics (overrides config file)
    #[arg(long, env = "PAPERLESS_EXPORTER_TELEMETRY_PATH")]
    telemetry_path: Option<String>,

    /// Paperless base URL (overrides config file)
    #[arg(long, env = "PAPERLESS_URL")]
    paperless_url: Option<String>,

    /// Paperless API token (overrides config file)
    #[arg(long, env = "PAPERLESS_AUTH_TOKEN", hide_env_values = true)]
    paperless_auth_token: Option<String>,

    /// Collection cycle budget, e.g. "1m" (overrides config file)
    #[arg(long, env = "PAPERLESS_EXPORTER_SCRAPE_TIMEOUT", value_parser = parse_duration)]
    scrape_timeout: Option<Duration>,

    /// Enable collectors that make Paperless contact the public internet
    #[arg(long, env = "PAPERLESS_EXPORTER_ENABLE_REMOTE_NETWORK")]
    enable_remote_network: bool,

    /// Comma-separated collector ids to enable (overrides config file)
    #[arg(long, env = "PAPERLESS_EXPORTER_COLLECTORS", value_delimiter = ',')]
    collectors: Option<Vec<String>>,

    /// Omit build info and process metrics
    #[arg(long, env = "PAPERLESS_EXPORTER_DISABLE_EXPORTER_METRICS")]
    disable_exporter_metrics: bool,
}

impl Cli {
    /// Apply CLI/env overrides (CLI > ENV > config file).
    fn apply(self, config: &mut AppConfig) {
        if let Some(bind) = self.server_bind {
            config.server.bind = bind;
        }
        if let Some(port) = self.server_port {
            config.server.port = port;
        }
        if let Some(path) = self.telemetry_path {
            config.server.telemetry_path = path;
        }
        if let Some(url) = self.paperless_url {
            config.paperless.url = url;
        }
        if let Some(token) = self.paperless_auth_token {
            config.paperless.auth_token = Some(token);
        }
        if let Some(timeout) = self.scrape_timeout {
            config.exporter.scrape_timeout = timeout;
        }
        if self.enable_remote_network {
            config.exporter.enable_remote_network = true;
        }
        if let Some(collectors) = self.collectors {
            config.exporter.collectors = collectors;
        }
        if self.disable_exporter_metrics {
            config.exporter.disable_exporter_metrics = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,paperless_exporter=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting paperless-exporter");

    // Parse CLI arguments
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            AppConfig::load(path)?
        }
        None => AppConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    tracing::info!(
        paperless = %config.paperless.url,
        scrape_timeout = ?config.exporter.scrape_timeout,
        remote_network = config.exporter.enable_remote_network,
        "Configuration loaded"
    );

    let shutdown = CancellationToken::new();

    let client = Arc::new(PaperlessClient::new(config.paperless.client_options())?);
    let sources = build_sources(
        client,
        &config.exporter.collectors,
        &config.exporter.source_options(shutdown.clone()),
    )?;

    let orchestrator = Orchestrator::new(sources).with_timeout(config.exporter.scrape_timeout);
    let mut exporter = Exporter::new(orchestrator)?;
    if !config.exporter.disable_exporter_metrics {
        exporter = exporter.with_registry(exporter_registry()?);
    }

    let app = create_router(AppState {
        exporter: Arc::new(exporter),
        telemetry_path: config.server.telemetry_path.clone(),
    });

    // Parse bind address
    let addr: SocketAddr = config.listen_addr().parse()?;

    tracing::info!(
        "Listening on: http://{}{}",
        addr,
        config.server.telemetry_path
    );

    // Start server with graceful shutdown
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }

    tracing::info!("Stopping background tasks...");
    shutdown.cancel();
}
