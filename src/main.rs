//! # docspan CLI
//!
//! ## Usage
//!
//! ```bash
//! docspan --config ./config/docspan.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docspan init` | Create the SQLite database and run schema migrations |
//! | `docspan chunk <file>` | Show how a file splits into spans |
//! | `docspan fingerprint <file>` | Print a file's checksum |
//! | `docspan upsert <id> <file>` | Upsert one file as a context |
//! | `docspan ingest [dir]` | Upsert every matching file under a directory |
//! | `docspan ingest --dry-run [--json]` | Preview ingestion without writing |
//! | `docspan search "<query>"` | Ranked span search |
//! | `docspan get <id>` | Print a context and its spans |
//! | `docspan queries` | List recently logged queries |
//! | `docspan serve` | Start the JSON HTTP server |
//!
//! Logs go to stderr and are filtered by `RUST_LOG` (default `docspan=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docspan::{config, get, ingest, inspect, migrate, search, server};

/// docspan: heading-bounded span index with checksum-gated ingestion.
#[derive(Parser)]
#[command(
    name = "docspan",
    about = "Change-aware span index for documentation",
    version,
    long_about = "docspan chunks documents at heading boundaries, skips re-ingesting content \
    whose checksum has not changed, and serves ranked term search over the stored spans \
    through a CLI and a JSON HTTP server."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docspan.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Split a file at heading boundaries and list the spans.
    ///
    /// Does not read the config or touch the database.
    Chunk {
        file: PathBuf,

        /// Deepest heading level that starts a span.
        #[arg(long, default_value_t = 3)]
        depth: usize,
    },

    /// Print the checksum of a file.
    Fingerprint { file: PathBuf },

    /// Upsert a single file as a context.
    ///
    /// Prints `created`, `updated`, or `unchanged`.
    Upsert {
        /// Context id.
        id: String,

        file: PathBuf,

        /// Context metadata as a JSON value.
        #[arg(long)]
        meta: Option<String>,
    },

    /// Upsert every matching file under a directory.
    ///
    /// Defaults to `[ingest].root`.
    Ingest {
        dir: Option<PathBuf>,

        /// Chunk and fingerprint the files without writing to the database.
        #[arg(long)]
        dry_run: bool,

        /// With --dry-run, print the documents as a JSON array of
        /// `{id, checksum, spans}`.
        #[arg(long, requires = "dry_run")]
        json: bool,
    },

    /// Search stored spans. Every call is logged.
    Search {
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,

        /// User id recorded on the query log row.
        #[arg(long)]
        user: Option<String>,
    },

    /// Print a context and its spans.
    Get { id: String },

    /// List recently logged queries, newest first.
    Queries {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Start the JSON HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docspan=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Chunk { file, depth } => return inspect::run_chunk(file, *depth),
        Commands::Fingerprint { file } => return inspect::run_fingerprint(file),
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Upsert { id, file, meta } => {
            ingest::run_upsert(&cfg, &id, &file, meta.as_deref()).await?;
        }
        Commands::Ingest { dir, dry_run, json } => {
            let mode = match (dry_run, json) {
                (false, _) => ingest::IngestMode::Write,
                (true, false) => ingest::IngestMode::DryRun,
                (true, true) => ingest::IngestMode::DryRunJson,
            };
            ingest::run_ingest(&cfg, dir.as_deref(), mode).await?;
        }
        Commands::Search { query, limit, user } => {
            search::run_search(&cfg, &query, limit, user.as_deref()).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id).await?;
        }
        Commands::Queries { limit } => {
            search::run_queries(&cfg, limit).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Chunk { .. } | Commands::Fingerprint { .. } => {}
    }

    Ok(())
}
