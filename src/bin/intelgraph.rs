//! intelgraph CLI: run the ingestion dispatcher or inspect the graph.
//!
//! Usage:
//!   intelgraph run [--config file] [--db path] [--once]
//!   intelgraph load FRAGMENT.json [--db path]
//!   intelgraph stats [--db path]
//!   intelgraph show NAME [--db path]

use clap::{Parser, Subcommand};
use intelgraph::config::{self, Config};
use intelgraph::ingest::{HttpDocumentStore, SpoolQueue};
use intelgraph::{
    ContentResolver, GraphMergeEngine, IngestionDispatcher, OpenStore, SqliteStore, WireFragment,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "intelgraph",
    version,
    about = "Merge security-intelligence feeds into a knowledge graph"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Log filter, e.g. `info` or `intelgraph=debug` (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the ingestion dispatcher
    Run {
        /// YAML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Stop once the queue is drained
        #[arg(long)]
        once: bool,
    },
    /// Merge a fragment file into the graph
    Load {
        /// JSON file with `vertices` and optional `edges`
        path: PathBuf,
    },
    /// Show vertex and edge counts
    Stats,
    /// Print a vertex's properties as JSON
    Show {
        /// Logical vertex name
        name: String,
    },
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|e| {
            eprintln!("Warning: invalid log level '{}': {}", level, e);
            EnvFilter::new("info")
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}

/// Get the default database path (~/.local/share/intelgraph/graph.db)
fn default_db_path() -> PathBuf {
    config::GraphConfig::default().db_path
}

fn open_engine(db_path: &Path) -> Result<GraphMergeEngine, String> {
    let store = SqliteStore::open(db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    GraphMergeEngine::new(Arc::new(store)).map_err(|e| format!("Failed to open indexes: {}", e))
}

fn with_engine(db: Option<PathBuf>, command: impl FnOnce(&GraphMergeEngine) -> i32) -> i32 {
    let db_path = db.unwrap_or_else(default_db_path);
    match open_engine(&db_path) {
        Ok(engine) => command(&engine),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config, String> {
    match path.or_else(Config::default_path) {
        Some(path) => Config::load(&path).map_err(|e| e.to_string()),
        None => Ok(Config::default()),
    }
}

async fn cmd_run(config_path: Option<PathBuf>, db: Option<PathBuf>, once: bool) -> i32 {
    let mut config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if let Some(db) = db {
        config.graph.db_path = db;
    }
    let mut settings = config.dispatcher.settings();
    if once {
        settings.persistent = false;
    }

    let engine = match open_engine(&config.graph.db_path) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let service = &config.document_service;
    let documents = match HttpDocumentStore::from_host(&service.host, service.port, service.timeout()) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let queue = match SpoolQueue::open(&config.queue.spool_dir) {
        Ok(q) => q,
        Err(e) => {
            eprintln!("Error: cannot open spool {}: {}", config.queue.spool_dir.display(), e);
            return 1;
        }
    };

    info!(
        db = %config.graph.db_path.display(),
        spool = %config.queue.spool_dir.display(),
        document_service = %format!("{}:{}", service.host, service.port),
        "starting"
    );

    let dispatcher = IngestionDispatcher::new(
        queue,
        ContentResolver::new(Arc::new(documents)),
        engine,
        settings,
    );
    let token = dispatcher.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing current message");
            token.cancel();
        }
    });

    let summary = dispatcher.run().await;
    println!(
        "Received {}: {} merged, {} discarded, {} requeued",
        summary.received, summary.merged, summary.discarded, summary.requeued
    );
    0
}

fn cmd_load(engine: &GraphMergeEngine, path: &Path) -> i32 {
    let json = match std::fs::read_to_string(path) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error: cannot read '{}': {}", path.display(), e);
            return 1;
        }
    };
    let fragment = match WireFragment::from_json(&json) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let report = engine.load_wire(&fragment);
    println!(
        "Merged {} vertices ({} new), {} edges created ({} already present), {} placeholders",
        report.vertices_merged,
        report.vertices_created,
        report.edges_created,
        report.edges_existing,
        report.placeholders_created
    );
    for rejection in &report.rejections {
        eprintln!("Warning: skipped {}: {}", rejection.description, rejection.reason);
    }
    0
}

fn cmd_stats(engine: &GraphMergeEngine) -> i32 {
    match (engine.vertex_count(), engine.edge_count()) {
        (Ok(vertices), Ok(edges)) => {
            println!("{:<10} {:>10}", "vertices", vertices);
            println!("{:<10} {:>10}", "edges", edges);
            0
        }
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_show(engine: &GraphMergeEngine, name: &str) -> i32 {
    match engine.find_vertex(name) {
        Ok(Some(vertex)) => match serde_json::to_string_pretty(&vertex.properties) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Ok(None) => {
            eprintln!("Error: vertex '{}' not found", name);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let code = match cli.command {
        Commands::Run { config, once } => cmd_run(config, cli.db, once).await,
        Commands::Load { path } => with_engine(cli.db, |engine| cmd_load(engine, &path)),
        Commands::Stats => with_engine(cli.db, cmd_stats),
        Commands::Show { name } => with_engine(cli.db, |engine| cmd_show(engine, &name)),
    };
    std::process::exit(code);
}
