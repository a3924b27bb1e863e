//! # Lifecycle Errors
//!
//! [`TransitionError`] is the structured failure every lifecycle operation
//! returns. Callers branch on [`TransitionError::class`] rather than on the
//! individual variants when deciding what to show a user.

use thiserror::Error;

use nsl_core::NamespaceId;

use crate::event::LifecycleEvent;
use crate::state::NamespaceState;

/// Why an event could not be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// No rule exists for the (state, event) pair.
    #[error("no transition from {from} via {event}")]
    InvalidTransition {
        /// State the namespace was in.
        from: NamespaceState,
        /// Event that was raised.
        event: LifecycleEvent,
    },

    /// A rule exists but one of its guards refused.
    #[error("{event} from {from} rejected by {guard}: {reason}")]
    GuardRejected {
        /// State the namespace was in.
        from: NamespaceState,
        /// Target of the last rule tried.
        to: NamespaceState,
        /// Event that was raised.
        event: LifecycleEvent,
        /// Name of the refusing guard.
        guard: &'static str,
        /// Human-readable explanation.
        reason: String,
    },

    /// The namespace changed between read and write.
    #[error(
        "namespace {namespace_id} was modified concurrently (expected version {expected_version})"
    )]
    ConcurrentModification {
        /// The contested namespace.
        namespace_id: NamespaceId,
        /// Version the writer read.
        expected_version: u64,
    },

    /// Storage was unavailable; nothing was written.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// The id does not resolve to a namespace.
    #[error("namespace {0} not found")]
    NamespaceNotFound(NamespaceId),
}

/// Coarse grouping of [`TransitionError`] for user-facing handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The action is not possible in the current state.
    NotAllowed,
    /// Try again; another actor won a race.
    Retry,
    /// Infrastructure or lookup failure.
    Hard,
}

impl TransitionError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::InvalidTransition { .. } | Self::GuardRejected { .. } => FailureClass::NotAllowed,
            Self::ConcurrentModification { .. } => FailureClass::Retry,
            Self::Persistence(_) | Self::NamespaceNotFound(_) => FailureClass::Hard,
        }
    }

    /// Target state named by the failure, if a rule was reached.
    pub fn attempted_target(&self) -> Option<NamespaceState> {
        match self {
            Self::GuardRejected { to, .. } => Some(*to),
            _ => None,
        }
    }

    /// Short reason string recorded in the audit log and `last_error`.
    pub fn reason(&self) -> String {
        match self {
            Self::InvalidTransition { .. } => "no such transition".to_string(),
            Self::GuardRejected { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }

    /// Name of the guard that refused, if any.
    pub fn guard(&self) -> Option<&'static str> {
        match self {
            Self::GuardRejected { guard, .. } => Some(guard),
            _ => None,
        }
    }
}

/// A persisted state column could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateDecodeError {
    /// The stored integer is outside the state enumeration.
    #[error("unknown namespace state code {0}")]
    UnknownCode(i16),
}
