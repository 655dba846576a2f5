//! oxide-migrate CLI
//!
//! Previews and applies the migration that converges a database onto a
//! schema document.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use oxide_core::{schema::document, Executor, Schema};
use oxide_sqlite::SqliteExecutor;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_migrate::prelude::*;

/// Declarative database migrations for oxide schemas.
#[derive(Parser)]
#[command(name = "oxide-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL.
    #[arg(
        short,
        long,
        env = "DATABASE_URL",
        default_value = "sqlite://db.sqlite3?mode=rwc"
    )]
    database: String,

    /// JSON schema document declaring the models.
    #[arg(short, long, env = "OXIDE_SCHEMA", default_value = "schema.json")]
    schema: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the statements a migration would run.
    Plan {
        /// Drop and recreate every declared table.
        #[arg(long)]
        force: bool,

        /// Print the operations as JSON instead of SQL.
        #[arg(long)]
        json: bool,
    },

    /// Apply the migration.
    Migrate {
        /// Drop and recreate every declared table.
        #[arg(long)]
        force: bool,

        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the live schema as JSON.
    Inspect,
}

fn load_schema(path: &Path) -> anyhow::Result<Schema> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read schema document {}", path.display()))?;
    document::parse(&text).with_context(|| format!("invalid schema document {}", path.display()))
}

fn print_sql(statements: &[String]) {
    for sql in statements {
        println!("{sql};");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays valid SQL or JSON.
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let executor = SqliteExecutor::connect(&cli.database)
        .await
        .with_context(|| format!("cannot open {}", cli.database))?;

    if matches!(cli.command, Commands::Inspect) {
        let live = executor.get_schema().await?;
        println!("{}", serde_json::to_string_pretty(&live)?);
        return Ok(());
    }

    let schema = load_schema(&cli.schema)?;
    let migrator = Migrator::new(&executor, &schema);

    match cli.command {
        Commands::Plan { force, json } => {
            let diff = migrator.plan(force).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&diff)?);
            } else if diff.is_empty() {
                info!("Schema is up to date.");
            } else {
                print_sql(&diff.to_sql(migrator.dialect()));
            }
        }

        Commands::Migrate { force, dry_run } => {
            if dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
                let diff = migrator.plan(force).await?;
                print_sql(&diff.to_sql(migrator.dialect()));
            } else {
                let report = migrator.migrate(force).await?;
                if report.is_empty() {
                    info!("Schema is up to date.");
                } else {
                    info!(
                        operations = report.applied.len(),
                        statements = report.statements.len(),
                        "Migration applied successfully."
                    );
                }
            }
        }

        Commands::Inspect => {}
    }

    Ok(())
}
