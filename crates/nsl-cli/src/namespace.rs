//! # Namespace Subcommand
//!
//! Lifecycle events and read queries for single namespaces.
//!
//! ## Subcommands
//!
//! - `create`: Register a namespace in `ancestor_inherited`.
//! - `archive`, `unarchive`, `schedule-deletion`, `start-deletion`,
//!   `reschedule-deletion`, `cancel-deletion`: Fire one event.
//! - `request-deletion`: Schedule or start deletion, as policy decides.
//! - `status`: Stored and derived lifecycle state as JSON.
//! - `effective`: Effective state and pending-deletion ancestor.
//! - `history`: Transition audit trail.
//! - `backfill`: Derive an explicit state from legacy flags.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};

use nsl_core::{Actor, NamespaceId};
use nsl_state::{LegacyFlags, LifecycleEvent, Namespace, NamespaceKind};

use crate::{parse_user_id, GlobalOptions, Workspace};

/// Arguments for the `nsl namespace` subcommand.
#[derive(Args, Debug)]
pub struct NamespaceArgs {
    #[command(subcommand)]
    pub command: NamespaceCommand,
}

/// Target of an event or query.
#[derive(Args, Debug, Clone, Copy)]
pub struct Target {
    /// Namespace id.
    #[arg(long)]
    pub id: i64,
}

#[derive(Subcommand, Debug)]
pub enum NamespaceCommand {
    /// Register a new namespace.
    Create {
        #[arg(long)]
        id: i64,
        /// Parent namespace id; omit for a root.
        #[arg(long)]
        parent: Option<i64>,
        #[arg(long, value_enum, default_value = "group")]
        kind: KindArg,
    },

    /// Archive (ancestor_inherited → archived).
    Archive(Target),

    /// Unarchive (archived → ancestor_inherited).
    Unarchive(Target),

    /// Schedule adjourned deletion.
    ScheduleDeletion(Target),

    /// Hand the namespace to the deletion executor.
    StartDeletion(Target),

    /// Restore a deletion in progress, or re-enter the grace period.
    RescheduleDeletion(Target),

    /// Cancel a scheduled or in-progress deletion.
    CancelDeletion(Target),

    /// Schedule deletion if adjournment applies, otherwise start it.
    RequestDeletion(Target),

    /// Print stored and derived lifecycle state as JSON.
    Status(Target),

    /// Print the effective state after ancestor inheritance.
    Effective(Target),

    /// Print the transition audit trail.
    History(Target),

    /// Derive an explicit state from legacy lifecycle flags.
    Backfill {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        archived: bool,
        /// Legacy deletion mark date (YYYY-MM-DD).
        #[arg(long)]
        marked_on: Option<NaiveDate>,
        /// User who set the legacy mark.
        #[arg(long, value_parser = parse_user_id)]
        marked_by: Option<i64>,
        #[arg(long)]
        pending_delete: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Group,
    Project,
    Personal,
}

impl From<KindArg> for NamespaceKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Group => NamespaceKind::Group,
            KindArg::Project => NamespaceKind::Project,
            KindArg::Personal => NamespaceKind::Personal,
        }
    }
}

/// Execute the namespace subcommand.
pub async fn run_namespace(
    args: &NamespaceArgs,
    workspace: &Workspace,
    options: &GlobalOptions,
) -> Result<u8> {
    match &args.command {
        NamespaceCommand::Create { id, parent, kind } => {
            cmd_create(workspace, *id, *parent, (*kind).into()).await
        }
        NamespaceCommand::Archive(t) => {
            cmd_event(workspace, options, t.id, LifecycleEvent::Archive).await
        }
        NamespaceCommand::Unarchive(t) => {
            cmd_event(workspace, options, t.id, LifecycleEvent::Unarchive).await
        }
        NamespaceCommand::ScheduleDeletion(t) => {
            cmd_event(workspace, options, t.id, LifecycleEvent::ScheduleDeletion).await
        }
        NamespaceCommand::StartDeletion(t) => {
            cmd_event(workspace, options, t.id, LifecycleEvent::StartDeletion).await
        }
        NamespaceCommand::RescheduleDeletion(t) => {
            cmd_event(workspace, options, t.id, LifecycleEvent::RescheduleDeletion).await
        }
        NamespaceCommand::CancelDeletion(t) => {
            cmd_event(workspace, options, t.id, LifecycleEvent::CancelDeletion).await
        }
        NamespaceCommand::RequestDeletion(t) => {
            cmd_request_deletion(workspace, options, t.id).await
        }
        NamespaceCommand::Status(t) => cmd_status(workspace, t.id).await,
        NamespaceCommand::Effective(t) => cmd_effective(workspace, t.id).await,
        NamespaceCommand::History(t) => cmd_history(workspace, t.id).await,
        NamespaceCommand::Backfill {
            id,
            archived,
            marked_on,
            marked_by,
            pending_delete,
        } => {
            let flags = LegacyFlags {
                archived: *archived,
                marked_for_deletion_on: *marked_on,
                marked_for_deletion_by: marked_by.map(|u| Actor::from_user_id(Some(u))),
                pending_delete: *pending_delete,
            };
            cmd_backfill(workspace, *id, &flags).await
        }
    }
}

async fn cmd_create(
    workspace: &Workspace,
    id: i64,
    parent: Option<i64>,
    kind: NamespaceKind,
) -> Result<u8> {
    let now = workspace.service().engine().clock().now();
    let namespace = Namespace::new(NamespaceId(id), parent.map(NamespaceId), kind, now);
    workspace
        .service()
        .register(&namespace)
        .await
        .with_context(|| format!("failed to create namespace {id}"))?;
    println!("OK: created {kind} namespace {id} in {}", namespace.state);
    Ok(0)
}

async fn cmd_event(
    workspace: &Workspace,
    options: &GlobalOptions,
    id: i64,
    event: LifecycleEvent,
) -> Result<u8> {
    let ctx = options.context();
    let state = workspace
        .service()
        .apply(NamespaceId(id), event, &ctx)
        .await
        .with_context(|| {
            format!(
                "{event} refused for namespace {id} (correlation {})",
                ctx.correlation_id
            )
        })?;
    println!("OK: namespace {id} {event} → {state}");
    Ok(0)
}

async fn cmd_request_deletion(
    workspace: &Workspace,
    options: &GlobalOptions,
    id: i64,
) -> Result<u8> {
    let ctx = options.context();
    let state = workspace
        .service()
        .request_deletion(NamespaceId(id), &ctx)
        .await
        .with_context(|| format!("deletion request refused for namespace {id}"))?;
    println!("OK: namespace {id} deletion requested → {state}");
    Ok(0)
}

async fn cmd_status(workspace: &Workspace, id: i64) -> Result<u8> {
    let status = workspace
        .service()
        .status(NamespaceId(id))
        .await
        .with_context(|| format!("failed to read namespace {id}"))?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(0)
}

async fn cmd_effective(workspace: &Workspace, id: i64) -> Result<u8> {
    let service = workspace.service();
    let state = service
        .effective_state(NamespaceId(id))
        .await
        .with_context(|| format!("failed to resolve namespace {id}"))?;
    let pending = service.effective_pending_deletion(NamespaceId(id)).await?;

    println!("Namespace: {id}");
    println!("  Effective state: {state}");
    match pending {
        Some(a) if a.id == NamespaceId(id) => println!("  Pending deletion: self ({})", a.state),
        Some(a) => println!("  Pending deletion: via ancestor {} ({})", a.id, a.state),
        None => println!("  Pending deletion: no"),
    }
    Ok(0)
}

async fn cmd_history(workspace: &Workspace, id: i64) -> Result<u8> {
    let records = workspace
        .service()
        .history(NamespaceId(id))
        .await
        .with_context(|| format!("failed to read history of namespace {id}"))?;

    println!("Namespace: {id}");
    println!("  Transitions: {}", records.len());
    for (i, r) in records.iter().enumerate() {
        let to = r.to_state.map_or_else(|| "-".to_string(), |s| s.to_string());
        let by = r.actor.to_string();
        match r.error_message() {
            None => println!(
                "    [{i}] {} {} → {to} by {by} at {}",
                r.event, r.from_state, r.timestamp
            ),
            Some(msg) => println!("    [{i}] FAILED {msg} (by {by} at {})", r.timestamp),
        }
    }
    Ok(0)
}

async fn cmd_backfill(workspace: &Workspace, id: i64, flags: &LegacyFlags) -> Result<u8> {
    let written = workspace
        .service()
        .backfill(NamespaceId(id), flags)
        .await
        .with_context(|| format!("failed to backfill namespace {id}"))?;
    if written {
        println!("OK: backfilled namespace {id}");
    } else {
        println!("OK: namespace {id} already has an explicit state");
    }
    Ok(0)
}
