//! ibsync - command-line front end for the assignment sync engine
//!
//! Subcommands:
//! - `match`: classify two names
//! - `reconcile`: run extractor and reconciler over JSON files
//! - `sync`: open a session on the data folder, reconcile once, flush
//! - `status`: show local cache timestamps

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use ibsync_common::config::{load_or_default, resolve_data_dir, TomlConfig};
use ibsync_common::time::{to_iso, today};
use ibsync_common::{Grid, Resident};
use ibsync_engine::persistence::local::last_updated;
use ibsync_engine::persistence::{
    FileStore, HttpRemote, GRID_KEY, REGISTRY_KEY, STAFF_ASSIGNMENTS_KEY,
};
use ibsync_engine::{extract, match_names, reconcile, Session, SessionInit};
use tracing::info;

/// Command-line arguments for ibsync
#[derive(Parser, Debug)]
#[command(name = "ibsync")]
#[command(about = "Assignment grid and resident registry synchronization")]
#[command(version)]
struct Args {
    /// Config file (defaults to the platform config folder)
    #[arg(long, global = true, env = "IBSYNC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify how two names match
    Match { a: String, b: String },

    /// Compute registry mutations from a grid
    Reconcile {
        /// Registry JSON file (array of residents)
        #[arg(long)]
        registry: PathBuf,

        /// Grid JSON file
        #[arg(long)]
        grid: PathBuf,

        /// Write the reconciled registry back to the registry file
        #[arg(long)]
        apply: bool,
    },

    /// Open a session, reconcile once and flush to the remote store
    Sync {
        /// Remote store base URL; offline when absent
        #[arg(long, env = "IBSYNC_REMOTE_URL")]
        remote: Option<String>,

        /// Data folder for the local cache
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Assignment date (YYYY-MM-DD), today when absent
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show local cache timestamps
    Status {
        /// Data folder for the local cache
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref());

    // Logs go to stderr so command output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Match { a, b } => {
            let result = match_names(&a, &b);
            println!("{}\t{:.3}", result.kind, result.score);
        }
        Command::Reconcile {
            registry,
            grid,
            apply,
        } => run_reconcile(registry, grid, apply)?,
        Command::Sync {
            remote,
            data_dir,
            date,
        } => run_sync(&config, remote, data_dir, date).await?,
        Command::Status { data_dir } => {
            let dir = resolve_data_dir(data_dir.as_deref(), &config);
            let store = FileStore::open(&dir)
                .with_context(|| format!("Failed to open data folder {}", dir.display()))?;
            println!("data folder: {}", dir.display());
            for key in [REGISTRY_KEY, GRID_KEY, STAFF_ASSIGNMENTS_KEY] {
                let stamp = last_updated(&store, key)?
                    .map(to_iso)
                    .unwrap_or_else(|| "never".to_string());
                println!("{:<18}{}", key, stamp);
            }
        }
    }

    Ok(())
}

fn run_reconcile(registry_path: PathBuf, grid_path: PathBuf, apply: bool) -> Result<()> {
    let residents: Vec<Resident> = read_json(&registry_path)?;
    let grid: Grid = read_json(&grid_path)?;

    let assignments = extract(&grid);
    let mutations = ibsync_engine::reconcile::plan(&residents, &assignments);
    info!(
        residents = residents.len(),
        entries = assignments.len(),
        mutations = mutations.len(),
        "Reconciled"
    );
    println!("{}", serde_json::to_string_pretty(&mutations)?);

    if apply && !mutations.is_empty() {
        let reconciled = reconcile(&residents, &assignments);
        let body = serde_json::to_string_pretty(&reconciled)?;
        std::fs::write(&registry_path, body)
            .with_context(|| format!("Failed to write {}", registry_path.display()))?;
        info!(path = %registry_path.display(), "Registry updated");
    }
    Ok(())
}

async fn run_sync(
    config: &TomlConfig,
    remote: Option<String>,
    data_dir: Option<PathBuf>,
    date: Option<NaiveDate>,
) -> Result<()> {
    let dir = resolve_data_dir(data_dir.as_deref(), config);
    let date = date.or(config.assignment_date).unwrap_or_else(today);
    let store = FileStore::open(&dir)
        .with_context(|| format!("Failed to open data folder {}", dir.display()))?;
    info!(data_dir = %dir.display(), date = %date, "Opening session");

    let mut init = SessionInit::offline(Arc::new(store), date).with_settings(config.sync.clone());
    if let Some(url) = remote.or_else(|| config.remote_url.clone()) {
        info!(remote = %url, "Using remote store");
        init = init.with_http_remote(HttpRemote::new(url, date)?);
    }

    let (mut session, load) = Session::init(init).await;
    let mutations = session.sync_assignments()?;
    session.flush_now().await;

    println!("registry: {:?} ({} residents)", load.registry.source, session.residents().len());
    println!("grid:     {:?} ({} rows)", load.grid.source, session.grid().row_count());
    println!("mutations applied: {}", mutations.len());
    println!("registry sync: {}", session.registry_status().label());
    println!("grid sync:     {}", session.grid_status().label());

    session.teardown().await;
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}
