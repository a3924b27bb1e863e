//! # nsl-state: Namespace Lifecycle State Machine
//!
//! Governs the lifecycle of tree-structured namespaces: archival, adjourned
//! (grace-period) deletion, cancellation, rescheduling, and authorization of
//! permanent removal.
//!
//! ## Components
//!
//! - **States and events** (`state.rs`, `event.rs`): the seven lifecycle
//!   states with their persisted codes, and the six events.
//!
//! - **Namespace model** (`namespace.rs`): schedule, metadata with restore
//!   history, and the optimistic-concurrency version.
//!
//! - **Ancestry** (`ancestry.rs`): pure helpers over a nearest-first
//!   ancestor chain, including effective state resolution.
//!
//! - **Policy** (`policy.rs`): adjourned versus immediate deletion.
//!
//! - **Guards and table** (`guard.rs`, `table.rs`): guarded
//!   `(state, event) -> [rule]` transitions evaluated in order.
//!
//! - **Engine** (`engine.rs`): pure evaluation into a [`TransitionPlan`],
//!   plus in-memory application with hooks and audit records.
//!
//! - **Legacy** (`legacy.rs`): NULL-state decoding and flag backfill. To be
//!   removed once every stored row carries a state code.
//!
//! This crate does no I/O. Persistence, ancestor loading, and batch
//! scheduling live in `nsl-store`.

pub mod ancestry;
pub mod audit;
pub mod engine;
pub mod error;
pub mod event;
pub mod guard;
pub mod hook;
pub mod legacy;
pub mod namespace;
pub mod policy;
pub mod state;
pub mod table;

pub use ancestry::{effective_pending_deletion, effective_state, AncestorChain, AncestorRef};
pub use audit::{TransitionLog, TransitionOutcome, TransitionRecord};
pub use engine::{note_rejection, replay, LifecycleEngine, TransitionContext, TransitionPlan};
pub use error::{FailureClass, StateDecodeError, TransitionError};
pub use event::LifecycleEvent;
pub use guard::{Guard, GuardInput};
pub use hook::{TracingHook, TransitionHook};
pub use legacy::{backfill_state, decode_stored_state, encode_state, BackfilledState, LegacyFlags};
pub use namespace::{DeletionSchedule, Namespace, NamespaceKind, StateMetadata};
pub use policy::{AdjournmentPolicy, InstanceAdjournmentPolicy};
pub use state::NamespaceState;
pub use table::{ScheduleEffect, TransitionRule, TransitionTable};
