//! CLI entry point for litebridge.
//!
//! This binary provides the `litebridge` command with subcommands for
//! migrating, inspecting, and maintaining a SQLite database through the
//! provider adapter.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use litebridge_store::{Database, SqliteProvider};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// litebridge — SQLite maintenance and inspection.
#[derive(Parser)]
#[command(
    name = "litebridge",
    version,
    about = "Inspect and maintain a litebridge SQLite database"
)]
struct Cli {
    /// Path to the SQLite database file.
    #[arg(long, default_value = "data/litebridge.db")]
    db: PathBuf,

    /// Emit machine-readable JSON instead of plain text.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database if needed and run pending schema migrations.
    Migrate,

    /// List user tables (engine catalog tables excluded).
    Tables,

    /// Report the logical and on-disk database size.
    Size,

    /// Reclaim free space (VACUUM, WAL truncate, optimize).
    Vacuum,

    /// Rebuild all indexes from scratch.
    Reindex,

    /// Split a multi-statement SQL script and print one statement per block.
    Split {
        /// Path to the script file.
        file: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Script splitting is pure text work — no database needed.
    if let Commands::Split { file } = &cli.command {
        return cmd_split(file, cli.json);
    }

    let provider = open_provider(&cli.db).await?;
    match cli.command {
        Commands::Migrate => cmd_migrate(&provider).await,
        Commands::Tables => cmd_tables(&provider, cli.json).await,
        Commands::Size => cmd_size(&provider, cli.json).await,
        Commands::Vacuum => cmd_vacuum(&provider).await,
        Commands::Reindex => cmd_reindex(&provider).await,
        Commands::Split { .. } => unreachable!("handled above"),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();
}

async fn open_provider(path: &PathBuf) -> Result<SqliteProvider> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("failed to create data directory")?;
        }
    }

    let db = Database::open_and_migrate(path.clone())
        .await
        .context("failed to open database")?;
    Ok(SqliteProvider::new(db))
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

async fn cmd_migrate(provider: &SqliteProvider) -> Result<()> {
    // open_provider already migrated; report the resulting schema.
    let tables = provider.table_names().await?;
    info!(tables = tables.len(), "database migrated");
    println!("database ready ({} tables)", tables.len());
    Ok(())
}

async fn cmd_tables(provider: &SqliteProvider, json: bool) -> Result<()> {
    let names = provider.table_names().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(())
}

async fn cmd_size(provider: &SqliteProvider, json: bool) -> Result<()> {
    let logical = provider.database_size().await?;
    let on_disk = provider.database_file_size()?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "logical_bytes": logical, "file_bytes": on_disk })
        );
    } else {
        println!("logical size: {logical} bytes");
        match on_disk {
            Some(bytes) => println!("on-disk size: {bytes} bytes"),
            None => println!("on-disk size: n/a (in-memory database)"),
        }
    }
    Ok(())
}

async fn cmd_vacuum(provider: &SqliteProvider) -> Result<()> {
    let before = provider.database_size().await?;
    provider.shrink().await?;
    let after = provider.database_size().await?;
    println!("vacuumed: {before} -> {after} bytes");
    Ok(())
}

async fn cmd_reindex(provider: &SqliteProvider) -> Result<()> {
    provider.rebuild_indexes().await?;
    println!("indexes rebuilt");
    Ok(())
}

fn cmd_split(file: &PathBuf, json: bool) -> Result<()> {
    let script = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let statements = litebridge_store::dialect::split_script(&script);

    if json {
        println!("{}", serde_json::to_string_pretty(&statements)?);
    } else {
        for (i, stmt) in statements.iter().enumerate() {
            println!("-- statement {}", i + 1);
            println!("{stmt}");
            println!();
        }
    }
    Ok(())
}
