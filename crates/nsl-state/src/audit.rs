//! # Transition Audit Records
//!
//! Every attempted transition, successful or not, produces one immutable
//! [`TransitionRecord`]. Records are write-only from the engine's point of
//! view and never influence whether a later transition is allowed.

use serde::{Deserialize, Serialize};

use nsl_core::{Actor, CorrelationId, NamespaceId, Timestamp};

use crate::error::TransitionError;
use crate::event::LifecycleEvent;
use crate::state::NamespaceState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    Success,
    Failure,
}

impl TransitionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransitionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempted transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub namespace_id: NamespaceId,
    pub event: LifecycleEvent,
    pub from_state: NamespaceState,
    /// `None` when no rule was reached.
    pub to_state: Option<NamespaceState>,
    pub actor: Actor,
    pub correlation_id: CorrelationId,
    pub timestamp: Timestamp,
    pub outcome: TransitionOutcome,
    /// Refusing guard, if any.
    pub guard: Option<String>,
    pub reason: Option<String>,
}

impl TransitionRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn success(
        namespace_id: NamespaceId,
        event: LifecycleEvent,
        from_state: NamespaceState,
        to_state: NamespaceState,
        actor: Actor,
        correlation_id: CorrelationId,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            namespace_id,
            event,
            from_state,
            to_state: Some(to_state),
            actor,
            correlation_id,
            timestamp,
            outcome: TransitionOutcome::Success,
            guard: None,
            reason: None,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn failure(
        namespace_id: NamespaceId,
        event: LifecycleEvent,
        from_state: NamespaceState,
        actor: Actor,
        correlation_id: CorrelationId,
        timestamp: Timestamp,
        error: &TransitionError,
    ) -> Self {
        Self {
            namespace_id,
            event,
            from_state,
            to_state: error.attempted_target(),
            actor,
            correlation_id,
            timestamp,
            outcome: TransitionOutcome::Failure,
            guard: error.guard().map(str::to_string),
            reason: Some(error.reason()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == TransitionOutcome::Success
    }

    /// The `last_error` text stored on the namespace for a failed record.
    pub fn error_message(&self) -> Option<String> {
        if self.is_success() {
            return None;
        }
        let reason = match self.reason.as_deref() {
            Some(r) if !r.trim().is_empty() => r,
            _ => "unknown reason",
        };
        Some(match self.to_state {
            Some(to) => format!(
                "Cannot transition from {} to {} via {}: {reason}",
                self.from_state, to, self.event
            ),
            None => format!(
                "Cannot transition from {} via {}: {reason}",
                self.from_state, self.event
            ),
        })
    }
}

/// Append-only sink for transition records.
pub trait TransitionLog {
    fn append(&mut self, record: TransitionRecord);
}

impl TransitionLog for Vec<TransitionRecord> {
    fn append(&mut self, record: TransitionRecord) {
        self.push(record);
    }
}
