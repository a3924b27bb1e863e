//! # Namespace Model
//!
//! A [`Namespace`] is a node in the containment tree together with its
//! lifecycle bookkeeping:
//!
//! - [`DeletionSchedule`] exists exactly while the namespace is
//!   `deletion_scheduled` or `deletion_in_progress`.
//! - [`StateMetadata`] exists for every namespace and survives all
//!   transitions. It records who last changed the state, the last failure
//!   reason, and the `preserved_states` history the restore guards read.
//! - `lock_version` is the optimistic-concurrency token. Stores bump it on
//!   every committed transition and compare it on write.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use nsl_core::{Actor, CorrelationId, NamespaceId, Timestamp, UserId, MAX_GRACE_PERIOD_DAYS};

use crate::event::LifecycleEvent;
use crate::state::NamespaceState;

/// Distinguishes personal namespaces from organizational ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceKind {
    /// A user's own namespace. Exempt from adjourned deletion.
    Personal,
    Group,
    Project,
}

impl NamespaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Group => "group",
            Self::Project => "project",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "personal" => Some(Self::Personal),
            "group" => Some(Self::Group),
            "project" => Some(Self::Project),
            _ => None,
        }
    }
}

impl std::fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The grace-period record of a namespace pending deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionSchedule {
    /// Day the deletion was requested. The grace period counts from here.
    pub marked_for_deletion_on: NaiveDate,
    /// Who requested the deletion.
    pub scheduled_by: Actor,
    /// Exact instant the schedule was created.
    pub scheduled_at: Timestamp,
}

impl DeletionSchedule {
    /// First day on which the namespace is eligible for `start_deletion`.
    pub fn permanent_deletion_date(&self, grace_period_days: i64) -> NaiveDate {
        let days = grace_period_days.clamp(0, MAX_GRACE_PERIOD_DAYS);
        self.marked_for_deletion_on
            .checked_add_signed(chrono::Duration::days(days))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Whether the grace period has fully elapsed by `cutoff`.
    pub fn is_due(&self, cutoff: NaiveDate) -> bool {
        self.marked_for_deletion_on <= cutoff
    }
}

/// Transition bookkeeping kept across every state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateMetadata {
    pub last_transition_at: Option<Timestamp>,
    /// `None` for system-triggered transitions.
    pub last_changed_by: Option<UserId>,
    /// Failure reason of the most recent rejected event; cleared on success.
    pub last_error: Option<String>,
    pub correlation_id: Option<CorrelationId>,
    /// State held immediately before `schedule_deletion` / `start_deletion`.
    pub preserved_states: BTreeMap<LifecycleEvent, NamespaceState>,
}

impl StateMetadata {
    pub fn preserved_state(&self, event: LifecycleEvent) -> Option<NamespaceState> {
        self.preserved_states.get(&event).copied()
    }

    /// The state a cancellation should restore: what the namespace was before
    /// it was scheduled, or before deletion started if it was never scheduled.
    pub fn state_before_deletion(&self) -> Option<NamespaceState> {
        self.preserved_state(LifecycleEvent::ScheduleDeletion)
            .or_else(|| self.preserved_state(LifecycleEvent::StartDeletion))
    }
}

/// A namespace and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub id: NamespaceId,
    pub parent_id: Option<NamespaceId>,
    pub kind: NamespaceKind,
    pub state: NamespaceState,
    pub deletion_schedule: Option<DeletionSchedule>,
    #[serde(default)]
    pub metadata: StateMetadata,
    #[serde(default)]
    pub lock_version: u64,
    pub created_at: Timestamp,
}

impl Namespace {
    /// A freshly created namespace in `ancestor_inherited`.
    pub fn new(
        id: NamespaceId,
        parent_id: Option<NamespaceId>,
        kind: NamespaceKind,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            parent_id,
            kind,
            state: NamespaceState::AncestorInherited,
            deletion_schedule: None,
            metadata: StateMetadata::default(),
            lock_version: 0,
            created_at,
        }
    }

    pub fn is_personal(&self) -> bool {
        matches!(self.kind, NamespaceKind::Personal)
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Whether this namespace itself holds an active deletion schedule.
    pub fn is_pending_deletion(&self) -> bool {
        self.state.has_active_deletion()
    }

    /// Check the schedule/state pairing. Returns a description of the first
    /// violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        match (self.state.has_active_deletion(), &self.deletion_schedule) {
            (true, None) => Err(format!(
                "namespace {} is {} without a deletion schedule",
                self.id, self.state
            )),
            (false, Some(_)) => Err(format!(
                "namespace {} is {} but still holds a deletion schedule",
                self.id, self.state
            )),
            _ => Ok(()),
        }
    }
}
