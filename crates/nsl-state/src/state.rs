//! # Namespace Lifecycle States
//!
//! ```text
//! ancestor_inherited ──archive──▶ archived
//!        ▲  ◀──unarchive────────────┘
//!        │
//!        ├──schedule_deletion──▶ deletion_scheduled ──start_deletion──▶ deletion_in_progress
//!        │                           │      ▲                               │
//!        ◀──cancel_deletion──────────┘      └──reschedule_deletion──────────┘
//!
//! creation_in_progress, transfer_in_progress, maintenance: owned by other
//! subsystems; no lifecycle event leaves them.
//! ```
//!
//! The full rule set, including the history-dependent restore targets, is
//! in [`crate::table`].
//!
//! Each state has a stable integer code used by persistence. Codes are part
//! of the storage contract and must never be renumbered.

use serde::{Deserialize, Serialize};

/// The lifecycle state of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceState {
    /// Default state; effective state comes from the nearest ancestor with
    /// an explicit state.
    AncestorInherited,
    /// Read-only; visible but not writable.
    Archived,
    /// Deletion requested; grace period running.
    DeletionScheduled,
    /// Being provisioned by the creation subsystem.
    CreationInProgress,
    /// Removal authorized; the deletion executor may proceed.
    DeletionInProgress,
    /// Being moved by the transfer subsystem.
    TransferInProgress,
    /// Administrative maintenance window.
    Maintenance,
}

impl NamespaceState {
    /// Every state, in code order.
    pub const ALL: [NamespaceState; 7] = [
        Self::AncestorInherited,
        Self::Archived,
        Self::DeletionScheduled,
        Self::CreationInProgress,
        Self::DeletionInProgress,
        Self::TransferInProgress,
        Self::Maintenance,
    ];

    /// The persisted integer code.
    pub fn code(&self) -> i16 {
        match self {
            Self::AncestorInherited => 0,
            Self::Archived => 1,
            Self::DeletionScheduled => 2,
            Self::CreationInProgress => 3,
            Self::DeletionInProgress => 4,
            Self::TransferInProgress => 5,
            Self::Maintenance => 6,
        }
    }

    /// Inverse of [`code()`](Self::code). Unknown codes return `None`.
    pub fn from_code(code: i16) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AncestorInherited => "ancestor_inherited",
            Self::Archived => "archived",
            Self::DeletionScheduled => "deletion_scheduled",
            Self::CreationInProgress => "creation_in_progress",
            Self::DeletionInProgress => "deletion_in_progress",
            Self::TransferInProgress => "transfer_in_progress",
            Self::Maintenance => "maintenance",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }

    /// States that carry an active deletion schedule.
    pub fn has_active_deletion(&self) -> bool {
        matches!(self, Self::DeletionScheduled | Self::DeletionInProgress)
    }

    /// Whether this state is set on the namespace itself rather than
    /// inherited.
    pub fn is_explicit(&self) -> bool {
        !matches!(self, Self::AncestorInherited)
    }
}

impl Default for NamespaceState {
    fn default() -> Self {
        Self::AncestorInherited
    }
}

impl std::fmt::Display for NamespaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NamespaceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown namespace state: {s:?}"))
    }
}
