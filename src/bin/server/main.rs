//! Kuba Metrics HTTP Server
//!
//! Serves the metrics engine over HTTP.
//!
//! # Endpoints
//!
//! ## Metrics
//! - `POST /api/v1/metrics/put` - PutMetricData
//! - `POST /api/v1/metrics/statistics` - GetMetricStatistics
//! - `POST /api/v1/metrics/list` - ListMetrics
//!
//! ## Admin
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics
//! - `GET /api/v1/stats` - Engine statistics
//!
//! # CLI Commands
//!
//! - `start` - Start the HTTP server (default if no command specified)
//! - `check-config` - Validate configuration file
//!
//! # Configuration
//!
//! The server reads configuration from:
//! 1. `--config` flag
//! 2. `KUBA_METRICS_CONFIG` environment variable (path to TOML file)
//! 3. `./kuba-metrics.toml` in current directory
//! 4. Default configuration
//!
//! `KUBA_METRICS_*` environment variables override file values.

use clap::{Parser, Subcommand};
use kuba_metrics::{
    api::{build_router, AppState},
    config::Config,
    engine::MetricsEngine,
    storage::snapshot::snapshot_path,
};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::signal;
use tracing::{debug, info, warn};

// =============================================================================
// CLI Definition
// =============================================================================

/// Kuba Metrics - metric ingestion and statistics query server
#[derive(Parser)]
#[command(name = "kuba-metrics")]
#[command(author = "Victor Oseghale")]
#[command(version)]
#[command(about = "Metric ingestion and statistics query server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (overrides KUBA_METRICS_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override listen address (e.g., 0.0.0.0:8080)
    #[arg(short, long, global = true)]
    listen: Option<String>,

    /// Override snapshot directory path
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Start,

    /// Validate configuration file without starting the server
    CheckConfig,
}

/// Load configuration and apply CLI overrides
fn resolve_config(cli: &Cli) -> Result<(Config, Option<PathBuf>), Box<dyn std::error::Error>> {
    let (mut config, path) = Config::load(cli.config.as_deref())?;

    if let Some(listen) = &cli.listen {
        let addr: SocketAddr = listen
            .parse()
            .map_err(|e| format!("Invalid listen address '{}': {}", listen, e))?;
        config.server.host = addr.ip().to_string();
        config.server.port = addr.port();
    }
    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = Some(data_dir.clone());
    }

    config.validate()?;
    Ok((config, path))
}

// =============================================================================
// CLI Command Handlers
// =============================================================================

/// Validate configuration and print summary
fn cmd_check_config(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (config, path) = resolve_config(cli)?;

    println!("Configuration is valid!");
    println!();
    match path {
        Some(p) => println!("Loaded from: {}", p.display()),
        None => println!("Loaded from: defaults"),
    }
    println!();
    println!("Server Settings:");
    println!("  Listen address: {}", config.listen_addr());
    println!();
    println!("Engine Settings:");
    println!("  Dimension match: {:?}", config.engine.dimension_match);
    println!("  Empty buckets: {:?}", config.engine.empty_buckets);
    println!("  Max datums per put: {}", config.engine.max_datums_per_put);
    println!(
        "  Max buckets per query: {}",
        config.engine.max_buckets_per_query
    );
    println!();
    println!("Storage:");
    match &config.storage.data_dir {
        Some(dir) => {
            println!("  Snapshot file: {}", snapshot_path(dir).display());
            println!(
                "  Snapshot on shutdown: {}",
                config.storage.snapshot_on_shutdown
            );
        }
        None => println!("  Persistence disabled (no data_dir)"),
    }
    println!();
    println!("Monitoring:");
    println!(
        "  Prometheus enabled: {}",
        config.monitoring.metrics_enabled
    );
    println!("  Log level: {}", config.monitoring.log_level);

    Ok(())
}

// =============================================================================
// Server Lifecycle
// =============================================================================

/// Graceful shutdown signal handler
///
/// A failed signal registration is logged and that signal is ignored, so
/// the server can still be stopped by the other one.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(
                error = %e,
                "Ctrl+C handler installation failed - graceful shutdown unavailable"
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "SIGTERM handler installation failed - SIGTERM shutdown unavailable"
                );
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

    info!("Shutdown signal received, starting graceful shutdown");
}

/// Write a snapshot during shutdown
fn flush_snapshot_on_shutdown(engine: &MetricsEngine, config: &Config) {
    let Some(dir) = &config.storage.data_dir else {
        return;
    };
    if !config.storage.snapshot_on_shutdown {
        debug!("Snapshot on shutdown disabled");
        return;
    }

    let start = std::time::Instant::now();
    match engine.save_snapshot(&snapshot_path(dir)) {
        Ok(count) => info!(
            datums = count,
            elapsed_ms = start.elapsed().as_millis(),
            "Snapshot written"
        ),
        Err(e) => warn!(
            error = %e,
            "Failed to write snapshot during shutdown - data since the last snapshot is lost"
        ),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::CheckConfig) => return cmd_check_config(&cli),
        Some(Commands::Start) | None => {}
    }

    let (config, config_path) = resolve_config(&cli)?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.monitoring.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!("Starting Kuba Metrics Server v{}", env!("CARGO_PKG_VERSION"));
    debug!(
        config_file = ?config_path,
        listen_addr = %config.listen_addr(),
        data_dir = ?config.storage.data_dir,
        "Configuration loaded"
    );

    // Build engine and restore the last snapshot
    let engine = Arc::new(MetricsEngine::builder().with_config(config.engine).build()?);
    if let Some(dir) = &config.storage.data_dir {
        let restored = engine.load_snapshot(&snapshot_path(dir))?;
        info!(datums = restored, "Engine initialized from snapshot");
    } else {
        info!("Engine initialized without persistence");
    }

    let state = Arc::new(AppState {
        engine: engine.clone(),
        metrics_enabled: config.monitoring.metrics_enabled,
    });
    let app = build_router(state, &config.server.cors_allowed_origins);

    let addr: SocketAddr = config.listen_addr().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    flush_snapshot_on_shutdown(&engine, &config);

    info!("Server shutdown complete");
    Ok(())
}
