//! # nsl CLI entry point
//!
//! Parses command-line arguments, opens the configured store, and dispatches
//! to subcommand handlers. The snapshot store is written back after every
//! command, whether it succeeded or not.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nsl_cli::namespace::{run_namespace, NamespaceArgs};
use nsl_cli::sweep::{run_sweep, SweepArgs};
use nsl_cli::{parse_user_id, run_migrate_legacy, GlobalOptions, Workspace};

/// Namespace lifecycle and adjourned deletion.
#[derive(Parser, Debug)]
#[command(name = "nsl", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Snapshot file used when no database is configured.
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Act as this user. Without it, events are attributed to the system.
    #[arg(long, global = true, value_parser = parse_user_id)]
    user: Option<i64>,

    /// Correlation id for the events of this invocation.
    #[arg(long, global = true)]
    correlation_id: Option<String>,

    /// Pin "today" (YYYY-MM-DD) instead of reading the system clock.
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Lifecycle events and queries for a namespace.
    Namespace(NamespaceArgs),

    /// Start deletion of every namespace past its grace period.
    Sweep(SweepArgs),

    /// Backfill explicit states from legacy lifecycle columns (Postgres).
    MigrateLegacy,
}

impl Cli {
    fn options(&self) -> GlobalOptions {
        GlobalOptions {
            config: self.config.clone(),
            state: self.state.clone(),
            user: self.user,
            correlation_id: self.correlation_id.clone(),
            today: self.today,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    tracing::debug!("nsl CLI starting");

    let options = cli.options();
    let workspace = match Workspace::open(&options).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(1);
        }
    };

    let result = match &cli.command {
        Commands::Namespace(args) => run_namespace(args, &workspace, &options).await,
        Commands::Sweep(args) => run_sweep(args, &workspace).await,
        Commands::MigrateLegacy => run_migrate_legacy(&workspace).await,
    };

    if let Err(e) = workspace.persist() {
        tracing::error!("{e:#}");
        return ExitCode::from(1);
    }

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
