//! mscope-ingest - computes recording metadata for registered miniscope recordings

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mscope_common::config::ConfigResolver;
use mscope_common::db::init_database;
use mscope_common::RootPolicy;
use mscope_ingest::{PopulationScheduler, SqliteMetadataStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for mscope-ingest
#[derive(Parser, Debug)]
#[command(name = "mscope-ingest")]
#[command(about = "Discover raw miniscope recordings and compute their metadata")]
#[command(version)]
struct Args {
    /// TOML config file (default: <config_dir>/mscope/config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Data root, in priority order; repeat for several roots
    #[arg(long = "root", value_name = "DIR")]
    roots: Vec<PathBuf>,

    /// What to do when a directory exists under several roots
    #[arg(long, value_name = "POLICY")]
    root_policy: Option<RootPolicy>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute metadata for every registered recording that lacks it
    Populate {
        /// Recompute and replace existing records
        #[arg(long)]
        force: bool,

        /// Recordings processed concurrently
        #[arg(long, value_name = "N")]
        workers: Option<usize>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show registered / computed / pending counts
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut resolver = ConfigResolver::new();
    if let Some(path) = &args.config {
        resolver = resolver.with_config_file(path);
    }
    let mut config = resolver.resolve().context("Failed to load configuration")?;

    // CLI flags take priority over file and environment
    if let Some(database) = args.database {
        config.database_path = Some(database);
    }
    if !args.roots.is_empty() {
        config.data_roots = args.roots;
    }
    if let Some(policy) = args.root_policy {
        config.root_policy = policy;
    }
    if let Command::Populate { workers: Some(n), .. } = &args.command {
        config.max_concurrent_recordings = *n;
    }
    config.validate().context("Invalid configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("Starting mscope-ingest v{}", env!("CARGO_PKG_VERSION"));

    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());
    for (i, root) in config.data_roots.iter().enumerate() {
        info!("Data root {}: {}", i, root.display());
    }

    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let store = Arc::new(SqliteMetadataStore::new(pool));
    let scheduler = PopulationScheduler::new(store, config);

    match args.command {
        Command::Populate { force, json, .. } => {
            let report = scheduler.populate(force).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "succeeded: {}  failed: {}  skipped: {}  warnings: {}",
                    report.succeeded.len(),
                    report.failed.len(),
                    report.skipped.len(),
                    report.warnings.len()
                );
                for failed in &report.failed {
                    println!("  FAILED {} [{}] {}", failed.key, failed.kind, failed.message);
                }
                for warning in &report.warnings {
                    println!("  WARN   {} [{}] {}", warning.key, warning.kind, warning.message);
                }
            }
            if !report.is_clean() {
                std::process::exit(2);
            }
        }
        Command::Status => {
            let counts = scheduler.status().await?;
            println!(
                "registered: {}  computed: {}  pending: {}",
                counts.registered, counts.computed, counts.pending
            );
        }
    }

    Ok(())
}
