//! ibsync-server - remote store for the assignment sync engine
//!
//! Serves the grid, staff headers and resident registry from a SQLite file in
//! the data folder.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ibsync_common::config::{load_or_default, resolve_data_dir};
use ibsync_server::{build_router, db, AppState, DEFAULT_PORT};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for ibsync-server
#[derive(Parser, Debug)]
#[command(name = "ibsync-server")]
#[command(about = "Remote store for assignment grids and the resident registry")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "IBSYNC_SERVER_PORT")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1", env = "IBSYNC_SERVER_BIND")]
    bind: std::net::IpAddr,

    /// Database file (defaults to ibsync.db in the data folder)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Config file (defaults to the platform config folder)
    #[arg(long, env = "IBSYNC_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("ibsync_server={},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ibsync-server v{}", env!("CARGO_PKG_VERSION"));

    let db_path = match args.database {
        Some(path) => path,
        None => {
            let dir = resolve_data_dir(None, &config);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create data folder {}", dir.display()))?;
            dir.join("ibsync.db")
        }
    };
    info!("Database path: {}", db_path.display());

    let pool = db::connect(&db_path)
        .await
        .context("Failed to open database")?;

    let app = build_router(AppState::new(pool));
    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("ibsync-server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
