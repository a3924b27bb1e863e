//! # nsl-cli: Namespace Lifecycle Command Line
//!
//! Provides the `nsl` command, a local stand-in for the lifecycle request
//! surface.
//!
//! ## Subcommands
//!
//! - `nsl namespace`: create namespaces, fire lifecycle events, read
//!   status, effective state and history.
//! - `nsl sweep`: run the deletion cutoff scheduler.
//! - `nsl migrate-legacy`: backfill explicit states from legacy columns
//!   (Postgres only).
//!
//! ## Storage
//!
//! With `database_url` configured (or `DATABASE_URL` set) commands run
//! against Postgres. Otherwise state lives in a JSON snapshot file, loaded
//! before the command and written back after it, including after a refused
//! event so its failure bookkeeping is kept.
//!
//! ```bash
//! nsl namespace create --id 1 --kind group
//! nsl --user 7 namespace schedule-deletion --id 1
//! nsl --today 2026-07-01 sweep
//! ```

pub mod namespace;
pub mod sweep;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;

use nsl_core::{Actor, Clock, CorrelationId, FixedClock, LifecycleConfig, SystemClock};
use nsl_state::TransitionContext;
use nsl_store::{init_pool, InMemoryStore, LifecycleService, NamespaceStore, PgStore};

/// Default snapshot location, relative to the working directory.
pub const DEFAULT_STATE_FILE: &str = ".nsl/state.json";

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub state: Option<PathBuf>,
    /// Acting user; `None` acts as the system.
    pub user: Option<i64>,
    pub correlation_id: Option<String>,
    /// Pin the clock to midnight UTC of this date.
    pub today: Option<NaiveDate>,
}

impl GlobalOptions {
    pub fn context(&self) -> TransitionContext {
        let ctx = TransitionContext::new(Actor::from_user_id(self.user));
        match &self.correlation_id {
            Some(id) => ctx.with_correlation_id(CorrelationId::new(id.clone())),
            None => ctx,
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.state
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
    }
}

/// Load configuration from `path` if given, else defaults; environment
/// overrides apply either way.
pub fn load_config(path: Option<&Path>) -> Result<LifecycleConfig> {
    match path {
        Some(path) => LifecycleConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => LifecycleConfig::from_env().context("invalid configuration from environment"),
    }
}

enum Backend {
    Snapshot { store: InMemoryStore, path: PathBuf },
    Postgres(PgStore),
}

/// An opened store plus the service wired over it.
pub struct Workspace {
    config: LifecycleConfig,
    service: Arc<LifecycleService>,
    backend: Backend,
}

impl Workspace {
    pub async fn open(options: &GlobalOptions) -> Result<Self> {
        let config = load_config(options.config.as_deref())?;
        Self::with_config(options, config).await
    }

    /// Open with an already-loaded configuration.
    pub async fn with_config(options: &GlobalOptions, config: LifecycleConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = match options.today {
            Some(date) => Arc::new(FixedClock::at_date(date)),
            None => Arc::new(SystemClock),
        };

        let backend = match init_pool(config.database_url.as_deref())
            .await
            .context("failed to connect to database")?
        {
            Some(pool) => Backend::Postgres(PgStore::new(pool)),
            None => {
                let path = options.state_path();
                let store = InMemoryStore::load(&path)
                    .with_context(|| format!("failed to load state file {}", path.display()))?;
                tracing::debug!(
                    path = %path.display(),
                    namespaces = store.len(),
                    "loaded snapshot"
                );
                Backend::Snapshot { store, path }
            }
        };

        let store: Arc<dyn NamespaceStore> = match &backend {
            Backend::Snapshot { store, .. } => Arc::new(store.clone()),
            Backend::Postgres(pg) => Arc::new(pg.clone()),
        };
        let service = Arc::new(LifecycleService::from_config(store, &config, clock));

        Ok(Self {
            config,
            service,
            backend,
        })
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn service(&self) -> &Arc<LifecycleService> {
        &self.service
    }

    pub fn postgres(&self) -> Option<&PgStore> {
        match &self.backend {
            Backend::Postgres(pg) => Some(pg),
            Backend::Snapshot { .. } => None,
        }
    }

    /// Write the snapshot back to disk. A no-op on Postgres.
    pub fn persist(&self) -> Result<()> {
        if let Backend::Snapshot { store, path } = &self.backend {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
            store
                .save(path)
                .with_context(|| format!("failed to write state file {}", path.display()))?;
        }
        Ok(())
    }
}

/// Run the legacy-column backfill over every unbackfilled row.
pub async fn run_migrate_legacy(workspace: &Workspace) -> Result<u8> {
    let Some(pg) = workspace.postgres() else {
        bail!("migrate-legacy requires a database; set DATABASE_URL or database_url");
    };
    let today = workspace.service().engine().clock().today();
    let written = pg
        .backfill_legacy(today, workspace.config().scheduler.batch_size)
        .await
        .context("legacy backfill failed")?;
    println!("OK: backfilled {written} namespace(s)");
    Ok(0)
}

/// Parse a `--user` style id, rejecting non-positive values.
pub fn parse_user_id(raw: &str) -> Result<i64, String> {
    let id: i64 = raw
        .parse()
        .map_err(|e| format!("invalid user id {raw:?}: {e}"))?;
    if id <= 0 {
        return Err(format!("user id must be positive, got {id}"));
    }
    Ok(id)
}
