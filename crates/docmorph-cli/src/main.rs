//! docmorph: command-line tool for docmorph stores.
//!
//! Applies the storage schema, prints the migration ledger, and reports how
//! many documents of a collection sit at each version.

mod census;

use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docmorph_core::{DocumentStore, MigrationHistoryRepository, MigrationSettings};
use docmorph_db::{Database, PoolConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use census::VersionCensus;

#[derive(Parser)]
#[command(name = "docmorph")]
#[command(author, version, about = "Inspect and prepare docmorph document stores")]
#[command(propagate_version = true)]
struct Cli {
    /// PostgreSQL connection URL (falls back to DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the migration ledger and document tables
    Init,

    /// Print applied database migrations in version order
    History,

    /// Count documents of a collection per stored version
    Status {
        /// Collection to inspect
        #[arg(short, long)]
        collection: String,

        /// Version field name (default: DOCMORPH_VERSION_FIELD or "Version")
        #[arg(short, long)]
        field: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let database_url = match cli.database_url {
        Some(url) => url,
        None => std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
    };
    let db = Database::connect_with_config(&database_url, PoolConfig::from_env())
        .await
        .context("failed to connect to the database")?;

    match cli.command {
        Commands::Init => cmd_init(&db).await,
        Commands::History => cmd_history(&db).await,
        Commands::Status { collection, field } => cmd_status(&db, &collection, field).await,
    }
}

async fn cmd_init(db: &Database) -> anyhow::Result<()> {
    db.migrate().await.context("failed to apply schema")?;
    info!(subsystem = "cli", op = "init", "Schema applied");
    println!("Schema is up to date.");
    Ok(())
}

async fn cmd_history(db: &Database) -> anyhow::Result<()> {
    let records = db.history.load().await?;
    if records.is_empty() {
        println!("No database migrations have been applied.");
        return Ok(());
    }
    for record in records {
        println!(
            "{:<10} {}  {}",
            record.version,
            record.applied_at.format("%Y-%m-%d %H:%M:%S UTC"),
            record.migration_id
        );
    }
    Ok(())
}

async fn cmd_status(db: &Database, collection: &str, field: Option<String>) -> anyhow::Result<()> {
    let field = match field {
        Some(field) => field,
        None => MigrationSettings::from_env()?.version_field_name,
    };
    let documents = db.documents.find_all(collection).await?;
    let census = VersionCensus::collect(&documents, &field);

    println!("{} ({} documents, field \"{}\")", collection, census.total(), field);
    for (version, count) in &census.versions {
        println!("  {:<10} {}", version.to_string(), count);
    }
    if census.missing > 0 {
        println!("  {:<10} {}", "(missing)", census.missing);
    }
    if census.malformed > 0 {
        println!("  {:<10} {}", "(invalid)", census.malformed);
    }
    Ok(())
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "docmorph=info")
///
/// Console output goes to stderr so command output stays clean on stdout.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "docmorph=info,docmorph_core=info,docmorph_db=info,docmorph_runner=info".into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("docmorph.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else if log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
        None
    } else {
        let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        if let Some(ansi) = log_ansi {
            layer = layer.with_ansi(ansi);
        }
        registry.with(layer).init();
        None
    }
}
