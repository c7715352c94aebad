//! Sextant binary — serve the query API or commit an indexing run.
//!
//! Usage:
//!   sextant serve              # serve queries over stdio
//!   sextant ingest <batches>   # build a snapshot from extractor output
//!   sextant stats              # print stats for the committed snapshot
//!
//! The server reads newline-delimited JSON requests on stdin and writes one
//! response envelope per line on stdout; tracing goes to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use sextant::store::{disk, ExtractionBatch, Snapshot, SnapshotBuilder};
use sextant::{api, Config, GraphService};

#[derive(Parser)]
#[command(name = "sextant")]
#[command(about = "Dependency-graph intelligence for codebases", long_about = None)]
struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the query API over stdio
    Serve,

    /// Build and commit a snapshot from a file of extraction batches
    Ingest {
        /// Path to a JSON file containing an array of extraction batches
        file: PathBuf,
    },

    /// Print statistics for the committed snapshot
    Stats,
}

fn main() {
    // Protocol owns stdout; tracing goes to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = cli.root.canonicalize().unwrap_or(cli.root);
    let config = Config::load(&root.join(sextant::config::DATA_DIR).join("config.toml"));
    let data_dir = config.resolve_data_dir(&root);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let snapshot = match disk::load(&data_dir)? {
                Some(snapshot) => {
                    info!(
                        snapshot = %snapshot.id(),
                        entities = snapshot.entity_count(),
                        "snapshot loaded"
                    );
                    snapshot
                }
                None => {
                    warn!("no committed snapshot found — serving an empty graph");
                    Snapshot::empty()
                }
            };

            let service = GraphService::new(snapshot);
            info!("ready — waiting for requests on stdin");
            api::server::run(&service, &config);
            Ok(())
        }

        Commands::Ingest { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let batches: Vec<ExtractionBatch> =
                serde_json::from_str(&raw).context("parsing extraction batches")?;

            let mut builder = SnapshotBuilder::new();
            for batch in batches {
                builder.ingest_batch(batch)?;
            }
            // A failed commit leaves any previously persisted snapshot
            // untouched; the rename in disk::save is the only mutation.
            let snapshot = builder.commit()?;
            let path = disk::save(&snapshot, &data_dir)?;
            info!(
                path = %path.display(),
                entities = snapshot.entity_count(),
                edges = snapshot.edge_count(),
                "index run committed"
            );
            Ok(())
        }

        Commands::Stats => {
            let snapshot = disk::load(&data_dir)?
                .context("no committed snapshot — run `sextant ingest` first")?;
            println!("{}", serde_json::to_string_pretty(&snapshot.stats())?);
            Ok(())
        }
    }
}
