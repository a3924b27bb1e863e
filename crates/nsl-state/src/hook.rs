//! Post-transition callbacks.

use std::fmt::Debug;

use crate::audit::TransitionRecord;
use crate::error::{FailureClass, TransitionError};

/// Called by the engine after each attempted transition. Hooks observe; they
/// cannot veto or alter the outcome.
pub trait TransitionHook: Send + Sync + Debug {
    fn on_success(&self, _record: &TransitionRecord) {}

    fn on_failure(&self, _record: &TransitionRecord, _error: &TransitionError) {}
}

/// Emits one structured `tracing` event per transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHook;

impl TransitionHook for TracingHook {
    fn on_success(&self, record: &TransitionRecord) {
        tracing::info!(
            namespace_id = %record.namespace_id,
            from_state = %record.from_state,
            to_state = ?record.to_state.map(|s| s.as_str()),
            event = %record.event,
            user_id = ?record.actor.user_id().map(|u| u.get()),
            correlation_id = %record.correlation_id,
            "Namespace state transition"
        );
    }

    fn on_failure(&self, record: &TransitionRecord, error: &TransitionError) {
        let message = failure_message(record, error);
        match error.class() {
            FailureClass::Retry => tracing::warn!(
                namespace_id = %record.namespace_id,
                event = %record.event,
                current_state = %record.from_state,
                error = %message,
                user_id = ?record.actor.user_id().map(|u| u.get()),
                correlation_id = %record.correlation_id,
                "Namespace state transition failed"
            ),
            FailureClass::NotAllowed | FailureClass::Hard => tracing::error!(
                namespace_id = %record.namespace_id,
                event = %record.event,
                current_state = %record.from_state,
                error = %message,
                user_id = ?record.actor.user_id().map(|u| u.get()),
                correlation_id = %record.correlation_id,
                "Namespace state transition failed"
            ),
        }
    }
}

/// The `last_error` text of a failed record, or the error itself when the
/// record carries none.
fn failure_message(record: &TransitionRecord, error: &TransitionError) -> String {
    record.error_message().unwrap_or_else(|| error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LifecycleEvent;
    use crate::state::NamespaceState;
    use nsl_core::{Actor, CorrelationId, NamespaceId, Timestamp};

    #[test]
    fn test_failure_log_uses_record_message() {
        let error = TransitionError::GuardRejected {
            from: NamespaceState::AncestorInherited,
            to: NamespaceState::Archived,
            event: LifecycleEvent::Archive,
            guard: "ancestor_state",
            reason: "cannot be changed as ancestor ID 4 is archived".to_string(),
        };
        let record = TransitionRecord::failure(
            NamespaceId(9),
            LifecycleEvent::Archive,
            NamespaceState::AncestorInherited,
            Actor::System,
            CorrelationId::new("c-9"),
            Timestamp::now(),
            &error,
        );
        assert_eq!(
            failure_message(&record, &error),
            "Cannot transition from ancestor_inherited to archived via archive: \
             cannot be changed as ancestor ID 4 is archived"
        );
    }
}
