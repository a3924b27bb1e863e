//! # nsl-store: Namespace Lifecycle Persistence and Orchestration
//!
//! Connects the pure state machine in `nsl-state` to storage.
//!
//! - [`NamespaceStore`]: compare-and-set persistence of namespaces plus
//!   their transition audit trail. [`InMemoryStore`] (DashMap, optional
//!   JSON snapshot file) and [`PgStore`] (sqlx) implement it.
//! - [`AncestorResolver`]: produces the ancestor chain guards evaluate.
//! - [`LifecycleService`]: load, resolve, evaluate, commit.
//! - [`CutoffScheduler`]: batch `start_deletion` for namespaces past their
//!   grace period.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod resolver;
pub mod scheduler;
pub mod service;
pub mod store;

pub use error::StoreError;
pub use memory::{InMemoryStore, Snapshot};
pub use postgres::{init_pool, PgStore};
pub use resolver::{AncestorResolver, ParentWalkResolver, StoreIndexedResolver};
pub use scheduler::{CutoffScheduler, SweepReport};
pub use service::{LifecycleService, NamespaceStatus};
pub use store::{walk_parents, NamespaceStore};
