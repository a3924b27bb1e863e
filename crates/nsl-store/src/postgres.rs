//! # Postgres Persistence Layer
//!
//! [`PgStore`] persists namespaces and their transition audit trail via
//! SQLx.
//!
//! The database layer is optional. When a database URL is configured the
//! lifecycle runs against Postgres; when absent it runs against
//! [`InMemoryStore`](crate::InMemoryStore) (development and tests).
//!
//! State machine rules are enforced at the application layer by the engine,
//! not in SQL. The database provides the compare-and-set on `lock_version`,
//! the atomic state + audit write, and a recursive query for ancestor
//! chains.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgConnection;

use nsl_core::{Actor, CorrelationId, NamespaceId, Timestamp};
use nsl_state::{
    backfill_state, decode_stored_state, encode_state, AncestorChain, AncestorRef,
    DeletionSchedule, LegacyFlags, LifecycleEvent, Namespace, NamespaceKind, NamespaceState,
    StateMetadata, TransitionOutcome, TransitionRecord,
};

use crate::error::StoreError;
use crate::store::NamespaceStore;

/// Initialize the connection pool and run migrations.
///
/// Returns `None` if no database URL is configured (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let url = match database_url {
        Some(url) => url,
        None => {
            tracing::warn!(
                "DATABASE_URL not set; running in-memory only mode. \
                 Lifecycle state will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

const NAMESPACE_COLUMNS: &str = "id, parent_id, kind, state, marked_for_deletion_on, \
     scheduled_by_user_id, scheduled_at, state_metadata, lock_version, created_at";

/// Writes a derived state onto a still-NULL row. Bumps `lock_version` so a
/// commit planned against the pre-backfill read loses its compare-and-set.
const BACKFILL_LEGACY_SQL: &str = "UPDATE namespaces
     SET state = $1, marked_for_deletion_on = $2, scheduled_by_user_id = $3,
         scheduled_at = $4,
         state_metadata = state_metadata || jsonb_build_object('preserved_states', $5::jsonb),
         lock_version = lock_version + 1
     WHERE id = $6 AND state IS NULL";

const TRANSITION_COLUMNS: &str = "namespace_id, event, from_state, to_state, actor_user_id, \
     correlation_id, outcome, guard, reason, created_at";

/// Postgres-backed [`NamespaceStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Derive a state for every row still holding NULL, from its legacy
    /// flags. Processes `batch_size` rows per round until none remain and
    /// returns the number of rows written.
    pub async fn backfill_legacy(
        &self,
        today: NaiveDate,
        batch_size: usize,
    ) -> Result<u64, StoreError> {
        let mut written = 0u64;
        loop {
            let rows = sqlx::query_as::<_, LegacyRow>(
                "SELECT id, archived, marked_for_deletion_on, scheduled_by_user_id, pending_delete
                 FROM namespaces WHERE state IS NULL ORDER BY id LIMIT $1",
            )
            .bind(to_db_count(batch_size))
            .fetch_all(&self.pool)
            .await?;

            let fetched = rows.len();
            for row in rows {
                let id = row.id;
                let flags = row.into_flags();
                let derived = backfill_state(&flags, today);
                let preserved = serde_json::to_value(&derived.preserved_states).map_err(|e| {
                    StoreError::Decode {
                        namespace_id: NamespaceId(id),
                        detail: format!("failed to serialize preserved_states: {e}"),
                    }
                })?;
                let (marked_on, by, at) = schedule_columns(derived.deletion_schedule.as_ref());

                let result = sqlx::query(BACKFILL_LEGACY_SQL)
                .bind(encode_state(derived.state))
                .bind(marked_on)
                .bind(by)
                .bind(at)
                .bind(&preserved)
                .bind(id)
                .execute(&self.pool)
                .await?;
                written += result.rows_affected();

                tracing::debug!(
                    namespace_id = id,
                    state = %derived.state,
                    "backfilled namespace state"
                );
            }

            if fetched < batch_size {
                break;
            }
        }
        tracing::info!(rows = written, "legacy state backfill complete");
        Ok(written)
    }
}

#[async_trait]
impl NamespaceStore for PgStore {
    async fn get(&self, id: NamespaceId) -> Result<Option<Namespace>, StoreError> {
        let sql = format!("SELECT {NAMESPACE_COLUMNS} FROM namespaces WHERE id = $1");
        let row = sqlx::query_as::<_, NamespaceRow>(&sql)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        row.map(NamespaceRow::into_namespace).transpose()
    }

    async fn insert(&self, namespace: &Namespace) -> Result<(), StoreError> {
        let metadata = metadata_json(namespace)?;
        let (marked_on, by, at) = schedule_columns(namespace.deletion_schedule.as_ref());
        let result = sqlx::query(
            "INSERT INTO namespaces
                 (id, parent_id, kind, state, marked_for_deletion_on, scheduled_by_user_id,
                  scheduled_at, state_metadata, lock_version, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(namespace.id.get())
        .bind(namespace.parent_id.map(|p| p.get()))
        .bind(namespace.kind.as_str())
        .bind(encode_state(namespace.state))
        .bind(marked_on)
        .bind(by)
        .bind(at)
        .bind(&metadata)
        .bind(to_db_version(namespace.lock_version))
        .bind(*namespace.created_at.as_datetime())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists(namespace.id));
        }
        Ok(())
    }

    async fn commit(
        &self,
        expected_version: u64,
        namespace: &Namespace,
        record: Option<&TransitionRecord>,
    ) -> Result<(), StoreError> {
        let metadata = metadata_json(namespace)?;
        let (marked_on, by, at) = schedule_columns(namespace.deletion_schedule.as_ref());

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE namespaces
             SET state = $1, marked_for_deletion_on = $2, scheduled_by_user_id = $3,
                 scheduled_at = $4, state_metadata = $5, lock_version = $6
             WHERE id = $7 AND lock_version = $8",
        )
        .bind(encode_state(namespace.state))
        .bind(marked_on)
        .bind(by)
        .bind(at)
        .bind(&metadata)
        .bind(to_db_version(namespace.lock_version))
        .bind(namespace.id.get())
        .bind(to_db_version(expected_version))
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let actual: Option<i64> =
                sqlx::query_scalar("SELECT lock_version FROM namespaces WHERE id = $1")
                    .bind(namespace.id.get())
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match actual {
                None => StoreError::NotFound(namespace.id),
                Some(actual) => StoreError::VersionConflict {
                    namespace_id: namespace.id,
                    expected: expected_version,
                    actual: from_db_version(actual),
                },
            });
        }

        if let Some(record) = record {
            insert_transition(&mut *tx, record).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn record_rejection(
        &self,
        expected_version: u64,
        record: &TransitionRecord,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE namespaces
             SET state_metadata = state_metadata || jsonb_build_object(
                 'last_error', $1::text,
                 'last_changed_by', $2::bigint,
                 'correlation_id', $3::text)
             WHERE id = $4 AND lock_version = $5",
        )
        .bind(record.error_message())
        .bind(record.actor.user_id().map(|u| u.get()))
        .bind(record.correlation_id.as_str())
        .bind(record.namespace_id.get())
        .bind(to_db_version(expected_version))
        .execute(&mut *tx)
        .await?;

        let written = result.rows_affected() > 0;
        if !written {
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM namespaces WHERE id = $1")
                .bind(record.namespace_id.get())
                .fetch_optional(&mut *tx)
                .await?;
            if exists.is_none() {
                return Err(StoreError::NotFound(record.namespace_id));
            }
            tracing::debug!(
                namespace_id = record.namespace_id.get(),
                "namespace changed since read, keeping its failure metadata"
            );
        }
        insert_transition(&mut *tx, record).await?;
        tx.commit().await?;
        Ok(written)
    }

    async fn scan_deletion_due(
        &self,
        cutoff: NaiveDate,
        after: Option<NamespaceId>,
        limit: usize,
    ) -> Result<Vec<Namespace>, StoreError> {
        let sql = format!(
            "SELECT {NAMESPACE_COLUMNS} FROM namespaces
             WHERE state = $1 AND marked_for_deletion_on <= $2 AND id > $3
             ORDER BY id LIMIT $4"
        );
        let rows = sqlx::query_as::<_, NamespaceRow>(&sql)
            .bind(encode_state(NamespaceState::DeletionScheduled))
            .bind(cutoff)
            .bind(after.map_or(i64::MIN, |a| a.get()))
            .bind(to_db_count(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(NamespaceRow::into_namespace).collect()
    }

    async fn transitions(&self, id: NamespaceId) -> Result<Vec<TransitionRecord>, StoreError> {
        let sql = format!(
            "SELECT {TRANSITION_COLUMNS} FROM namespace_state_transitions
             WHERE namespace_id = $1 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, TransitionRow>(&sql)
            .bind(id.get())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TransitionRow::into_record).collect()
    }

    /// One recursive query instead of a round trip per ancestor.
    async fn ancestor_chain(
        &self,
        namespace: &Namespace,
        max_depth: usize,
    ) -> Result<AncestorChain, StoreError> {
        let rows = sqlx::query_as::<_, AncestorRow>(
            "WITH RECURSIVE chain AS (
                 SELECT id, parent_id, state, 0 AS depth, ARRAY[id] AS path
                 FROM namespaces WHERE id = $1
               UNION ALL
                 SELECT n.id, n.parent_id, n.state, c.depth + 1, c.path || n.id
                 FROM namespaces n
                 JOIN chain c ON n.id = c.parent_id
                 WHERE c.depth <= $2 AND NOT n.id = ANY(c.path)
             )
             SELECT id, parent_id, state, depth, path FROM chain
             WHERE depth > 0 ORDER BY depth",
        )
        .bind(namespace.id.get())
        .bind(i32::try_from(max_depth).unwrap_or(i32::MAX))
        .fetch_all(&self.pool)
        .await?;

        if rows.len() > max_depth {
            return Err(StoreError::DepthExceeded {
                namespace_id: namespace.id,
                max_depth,
            });
        }
        if let Some(deepest) = rows.last() {
            if deepest.parent_id.is_some_and(|p| deepest.path.contains(&p)) {
                return Err(StoreError::HierarchyCycle(namespace.id));
            }
        }

        let mut ancestors = Vec::with_capacity(rows.len());
        for row in rows {
            ancestors.push(AncestorRef {
                id: NamespaceId(row.id),
                state: decode_stored_state(row.state)?,
            });
        }
        Ok(AncestorChain::new(ancestors))
    }
}

async fn insert_transition(
    conn: &mut PgConnection,
    record: &TransitionRecord,
) -> Result<(), sqlx::Error> {
    let sql = format!(
        "INSERT INTO namespace_state_transitions ({TRANSITION_COLUMNS})
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
    );
    sqlx::query(&sql)
        .bind(record.namespace_id.get())
        .bind(record.event.as_str())
        .bind(encode_state(record.from_state))
        .bind(record.to_state.map(encode_state))
        .bind(record.actor.user_id().map(|u| u.get()))
        .bind(record.correlation_id.as_str())
        .bind(record.outcome.as_str())
        .bind(record.guard.as_deref())
        .bind(record.reason.as_deref())
        .bind(*record.timestamp.as_datetime())
        .execute(conn)
        .await?;
    Ok(())
}

fn metadata_json(namespace: &Namespace) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(&namespace.metadata).map_err(|e| StoreError::Decode {
        namespace_id: namespace.id,
        detail: format!("failed to serialize state_metadata: {e}"),
    })
}

fn schedule_columns(
    schedule: Option<&DeletionSchedule>,
) -> (Option<NaiveDate>, Option<i64>, Option<DateTime<Utc>>) {
    match schedule {
        Some(s) => (
            Some(s.marked_for_deletion_on),
            s.scheduled_by.user_id().map(|u| u.get()),
            Some(*s.scheduled_at.as_datetime()),
        ),
        None => (None, None, None),
    }
}

fn to_db_version(version: u64) -> i64 {
    i64::try_from(version).unwrap_or(i64::MAX)
}

fn from_db_version(version: i64) -> u64 {
    u64::try_from(version).unwrap_or(0)
}

fn to_db_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

// ─── Row types ───────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct NamespaceRow {
    id: i64,
    parent_id: Option<i64>,
    kind: String,
    state: Option<i16>,
    marked_for_deletion_on: Option<NaiveDate>,
    scheduled_by_user_id: Option<i64>,
    scheduled_at: Option<DateTime<Utc>>,
    state_metadata: serde_json::Value,
    lock_version: i64,
    created_at: DateTime<Utc>,
}

impl NamespaceRow {
    fn into_namespace(self) -> Result<Namespace, StoreError> {
        let id = NamespaceId(self.id);
        let state = decode_stored_state(self.state).map_err(|e| {
            tracing::warn!(
                namespace_id = %id,
                state = ?self.state,
                error = %e,
                "unknown namespace state in database"
            );
            e
        })?;
        let kind = NamespaceKind::from_name(&self.kind).ok_or_else(|| StoreError::Decode {
            namespace_id: id,
            detail: format!("unknown namespace kind {:?}", self.kind),
        })?;

        let metadata: StateMetadata =
            serde_json::from_value(self.state_metadata).unwrap_or_else(|e| {
                tracing::warn!(
                    namespace_id = %id,
                    error = %e,
                    "failed to deserialize state_metadata, defaulting to empty"
                );
                StateMetadata::default()
            });

        // Legacy rows can carry a deletion date while still reading as
        // inherited; the schedule only exists for the deletion states.
        let deletion_schedule = match self.marked_for_deletion_on {
            Some(on) if state.has_active_deletion() => Some(DeletionSchedule {
                marked_for_deletion_on: on,
                scheduled_by: Actor::from_user_id(self.scheduled_by_user_id),
                scheduled_at: self
                    .scheduled_at
                    .map(Timestamp::from_utc)
                    .unwrap_or_else(|| Timestamp::start_of_day(on)),
            }),
            _ => None,
        };

        Ok(Namespace {
            id,
            parent_id: self.parent_id.map(NamespaceId),
            kind,
            state,
            deletion_schedule,
            metadata,
            lock_version: from_db_version(self.lock_version),
            created_at: Timestamp::from_utc(self.created_at),
        })
    }
}

#[derive(sqlx::FromRow)]
struct TransitionRow {
    namespace_id: i64,
    event: String,
    from_state: i16,
    to_state: Option<i16>,
    actor_user_id: Option<i64>,
    correlation_id: String,
    outcome: String,
    guard: Option<String>,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TransitionRow {
    fn into_record(self) -> Result<TransitionRecord, StoreError> {
        let namespace_id = NamespaceId(self.namespace_id);
        let decode = |detail: String| StoreError::Decode {
            namespace_id,
            detail,
        };
        let event = LifecycleEvent::from_name(&self.event)
            .ok_or_else(|| decode(format!("unknown lifecycle event {:?}", self.event)))?;
        let outcome = TransitionOutcome::from_name(&self.outcome)
            .ok_or_else(|| decode(format!("unknown transition outcome {:?}", self.outcome)))?;

        Ok(TransitionRecord {
            namespace_id,
            event,
            from_state: decode_stored_state(Some(self.from_state))?,
            to_state: self.to_state.map(|c| decode_stored_state(Some(c))).transpose()?,
            actor: Actor::from_user_id(self.actor_user_id),
            correlation_id: CorrelationId::new(self.correlation_id),
            timestamp: Timestamp::from_utc(self.created_at),
            outcome,
            guard: self.guard,
            reason: self.reason,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AncestorRow {
    id: i64,
    parent_id: Option<i64>,
    state: Option<i16>,
    #[allow(dead_code)]
    depth: i32,
    path: Vec<i64>,
}

#[derive(sqlx::FromRow)]
struct LegacyRow {
    id: i64,
    archived: bool,
    marked_for_deletion_on: Option<NaiveDate>,
    scheduled_by_user_id: Option<i64>,
    pending_delete: bool,
}

impl LegacyRow {
    fn into_flags(self) -> LegacyFlags {
        LegacyFlags {
            archived: self.archived,
            marked_for_deletion_on: self.marked_for_deletion_on,
            marked_for_deletion_by: self
                .scheduled_by_user_id
                .map(|id| Actor::from_user_id(Some(id))),
            pending_delete: self.pending_delete,
        }
    }
}
