// src/main.rs

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use sqlbuns::config::Config;
use sqlbuns::differ::column::{NonInteractiveOracle, RenameOracle};
use sqlbuns::dialect::Dialect;
use sqlbuns::exec::{open_sqlite, Introspector, SqliteExecutor, SqliteIntrospector};
use sqlbuns::migrate::{self, CreateOutcome, DownOutcome, UpOutcome};
use sqlbuns::model::Schema;
use std::io::{self, BufRead, Write};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sqlbuns")]
#[command(author, version, about = "Schema-migration engine for Postgres, MySQL and SQLite", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Diff the current model set against the last snapshot and write a new
    /// migration if anything changed
    Create {
        /// Short description used in the migration's file stem
        name: String,
        /// Never prompt for rename confirmation; always treat add+drop as
        /// two independent column changes
        #[arg(long)]
        no_prompt: bool,
    },
    /// Apply the next pending migration
    Up,
    /// Apply every pending migration
    UpAll,
    /// Roll back the most recently applied migration
    Down,
    /// Alias for `down`
    Rollback,
    /// Print the live database's table/column/index/trigger inventory
    Inspectdb,
    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Confirms renames on an interactive terminal; answers `false` (no rename,
/// treat as independent add+drop) the moment stdin can't be read, matching
/// `NonInteractiveOracle`'s behavior under `--no-prompt` or a closed stdin.
struct StdinOracle;

impl RenameOracle for StdinOracle {
    fn confirm_rename(&self, table: &str, old: &str, new: &str, type_tag: &str) -> bool {
        print!(
            "table '{table}': rename column '{old}' -> '{new}' ({type_tag})? [y/N] "
        );
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

fn load_current_schema(config: &Config) -> Result<Schema> {
    let text = std::fs::read_to_string(&config.models_path)
        .with_context(|| format!("reading model set from {}", config.models_path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing {} as JSON", config.models_path.display()))?;
    Ok(Schema::from_canonical_view(&value)?)
}

fn print_create_outcome(outcome: CreateOutcome) {
    match outcome {
        CreateOutcome::NoChanges => {
            println!("No schema changes detected; nothing to create.");
        }
        CreateOutcome::Created { stem, warnings } => {
            println!("Wrote migration '{stem}'.");
            for warning in warnings {
                warn!("{warning}");
                eprintln!("warning: {warning}");
            }
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Create { name, no_prompt }) => {
            let config = Config::from_env()?;
            info!("loading model set from {}", config.models_path.display());
            let schema = load_current_schema(&config)?;
            let schema = sqlbuns::resolver::resolve(schema.models())?;

            let conn = match config.dialect {
                Dialect::Sqlite => open_sqlite(&config.sqlite_path)?,
                other => {
                    return Err(anyhow::Error::new(sqlbuns::Error::NotImplemented(
                        "create against a live Postgres/MySQL connection (bring your own pool and Introspector)",
                    )))
                    .with_context(|| format!("dialect {other:?} has no bundled executor"));
                }
            };
            let introspector = SqliteIntrospector::new(&conn);
            let oracle: Box<dyn RenameOracle> = if no_prompt {
                Box::new(NonInteractiveOracle)
            } else {
                Box::new(StdinOracle)
            };

            let outcome = migrate::create(
                &conn,
                config.dialect,
                &config.migrations_dir,
                &schema,
                &introspector,
                oracle.as_ref(),
                &name,
            )?;
            print_create_outcome(outcome);
            Ok(())
        }
        Some(Commands::Up) => {
            let config = Config::from_env()?;
            let conn = open_sqlite(&config.sqlite_path)?;
            let executor = SqliteExecutor::new(&conn);
            match migrate::up(&conn, &executor, &config.migrations_dir)? {
                UpOutcome::NoPending => println!("No pending migrations."),
                UpOutcome::Applied { name } => println!("Applied '{name}'."),
            }
            Ok(())
        }
        Some(Commands::UpAll) => {
            let config = Config::from_env()?;
            let conn = open_sqlite(&config.sqlite_path)?;
            let executor = SqliteExecutor::new(&conn);
            let applied = migrate::up_all(&conn, &executor, &config.migrations_dir)?;
            if applied.is_empty() {
                println!("No pending migrations.");
            } else {
                for name in &applied {
                    println!("Applied '{name}'.");
                }
            }
            Ok(())
        }
        Some(Commands::Down) | Some(Commands::Rollback) => {
            let config = Config::from_env()?;
            let conn = open_sqlite(&config.sqlite_path)?;
            let executor = SqliteExecutor::new(&conn);
            match migrate::down(&conn, &executor, &config.migrations_dir)? {
                DownOutcome::NothingToRollBack => println!("No applied migrations to roll back."),
                DownOutcome::RolledBack { name } => println!("Rolled back '{name}'."),
            }
            Ok(())
        }
        Some(Commands::Inspectdb) => {
            let config = Config::from_env()?;
            let conn = open_sqlite(&config.sqlite_path)?;
            let introspector = SqliteIntrospector::new(&conn);
            for (name, _) in introspector.trigger_bodies() {
                println!("trigger: {name}");
            }
            Err(sqlbuns::Error::NotImplemented(
                "inspectdb's full table/column inventory (the bundled Introspector only exposes the narrow probes C5/C7/C8 need)",
            )
            .into())
        }
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}
