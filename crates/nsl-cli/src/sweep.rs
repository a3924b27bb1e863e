//! # Sweep Subcommand
//!
//! Runs the deletion cutoff scheduler once: every namespace whose grace
//! period has elapsed by today is moved to `deletion_in_progress` by the
//! system actor.

use anyhow::{Context, Result};
use clap::Args;

use nsl_core::NamespaceId;
use nsl_state::InstanceAdjournmentPolicy;
use nsl_store::CutoffScheduler;

use crate::Workspace;

/// Arguments for the `nsl sweep` subcommand.
#[derive(Args, Debug, Default)]
pub struct SweepArgs {
    /// Resume after this namespace id.
    #[arg(long)]
    pub after: Option<i64>,

    /// Process a single batch and print the resume cursor.
    #[arg(long)]
    pub once: bool,

    /// Override `scheduler.batch_size`.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Execute the sweep subcommand.
pub async fn run_sweep(args: &SweepArgs, workspace: &Workspace) -> Result<u8> {
    let config = workspace.config();
    let mut scheduler_config = config.scheduler.clone();
    if let Some(batch_size) = args.batch_size {
        scheduler_config.batch_size = batch_size.max(1);
    }

    let scheduler = CutoffScheduler::new(
        workspace.service().clone(),
        InstanceAdjournmentPolicy::from_config(&config.adjourned_deletion),
        scheduler_config,
    );

    let after = args.after.map(NamespaceId);
    let report = if args.once {
        scheduler.run_batch(after).await
    } else {
        scheduler.run_to_completion(after).await
    }
    .context("deletion sweep failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        match report.cutoff {
            Some(cutoff) => println!("Cutoff: {cutoff}"),
            None => println!("Cutoff: -"),
        }
        println!("  Scanned: {}", report.scanned);
        println!("  Started: {}", report.started);
        println!("  Skipped: {}", report.skipped);
        println!("  Conflicted: {}", report.conflicted);
        println!("  Failed: {}", report.failed);
        if let Some(cursor) = report.next_cursor {
            println!("  Resume after: {cursor}");
        }
    }

    Ok(if report.failed > 0 { 2 } else { 0 })
}
