//! anchorpq-daemon binary: argument parsing, logging, startup, serve.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anchorpq_core::config::CryptoConfig;
use anchorpq_core::verify::RecordRepository;
use anchorpq_daemon::http;
use anchorpq_daemon::repository::SqliteRecordRepository;
use anchorpq_daemon::state::ServerState;
use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// AnchorPQ integrity verification server.
#[derive(Parser, Debug)]
#[command(name = "anchorpq-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "anchorpq.toml")]
    config: PathBuf,

    /// Address to bind the HTTP listener to.
    #[arg(long, default_value = "127.0.0.1:8443")]
    bind: SocketAddr,

    /// Path to the SQLite record database.
    #[arg(long, default_value = "anchorpq.db")]
    db: PathBuf,

    /// Keypair file path (overrides `kem.key_file_path` from the config).
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = if args.config.exists() {
        CryptoConfig::from_file(&args.config).context("failed to load configuration")?
    } else {
        info!(config = %args.config.display(), "no config file found, using defaults");
        CryptoConfig::default()
    };
    if let Some(key_file) = &args.key_file {
        config.kem.key_file_path = Some(key_file.clone());
    }

    let repository: Arc<dyn RecordRepository> = Arc::new(
        SqliteRecordRepository::open(&args.db)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .context("failed to open record database")?,
    );

    let state = ServerState::init(&config, repository).context("server state init failed")?;

    let app = http::router(state);
    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .context("failed to bind HTTP listener")?;
    info!(addr = %args.bind, "anchorpq-daemon listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("daemon shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
}
