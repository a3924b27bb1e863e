//! # Legacy Storage Adapter
//!
//! Rows written before the `state` column existed hold NULL. They decode to
//! `ancestor_inherited`. Once every row has been backfilled this module can
//! be deleted and [`decode_stored_state`] replaced by
//! [`NamespaceState::from_code`].
//!
//! [`backfill_state`] derives the state of a pre-state-column namespace from
//! the legacy flags it used to carry, keeping the lower-priority flags as
//! restore history so a later cancellation lands where the old flags said.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use nsl_core::{Actor, Timestamp};

use crate::error::StateDecodeError;
use crate::event::LifecycleEvent;
use crate::namespace::{DeletionSchedule, Namespace};
use crate::state::NamespaceState;

/// Decode the persisted `state` column.
///
/// # Errors
///
/// Returns [`StateDecodeError::UnknownCode`] for codes outside the
/// enumeration. Those are never coerced to a default.
pub fn decode_stored_state(raw: Option<i16>) -> Result<NamespaceState, StateDecodeError> {
    match raw {
        None => Ok(NamespaceState::AncestorInherited),
        Some(code) => NamespaceState::from_code(code).ok_or(StateDecodeError::UnknownCode(code)),
    }
}

/// Encode a state for the `state` column. New writes never emit NULL.
pub fn encode_state(state: NamespaceState) -> i16 {
    state.code()
}

/// Lifecycle flags from the pre-state-machine schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyFlags {
    pub archived: bool,
    pub marked_for_deletion_on: Option<NaiveDate>,
    pub marked_for_deletion_by: Option<Actor>,
    /// Removal already handed to the executor.
    pub pending_delete: bool,
}

/// Result of backfilling one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfilledState {
    pub state: NamespaceState,
    pub preserved_states: BTreeMap<LifecycleEvent, NamespaceState>,
    pub deletion_schedule: Option<DeletionSchedule>,
}

impl BackfilledState {
    /// Write the derived state onto a namespace that still reads as
    /// `ancestor_inherited`. Namespaces already holding an explicit state
    /// are left alone and `false` is returned.
    pub fn apply_to(self, namespace: &mut Namespace) -> bool {
        if namespace.state.is_explicit() || self.state == namespace.state {
            return false;
        }
        namespace.state = self.state;
        namespace.deletion_schedule = self.deletion_schedule;
        namespace.metadata.preserved_states = self.preserved_states;
        true
    }
}

/// Derive the lifecycle state from legacy flags.
///
/// Priority is `deletion_in_progress > deletion_scheduled > archived`. Each
/// lower-priority flag that is set becomes the preserved "previous" state of
/// the next step up the chain. `today` dates schedules for namespaces that
/// were handed to the executor without ever being marked.
pub fn backfill_state(flags: &LegacyFlags, today: NaiveDate) -> BackfilledState {
    let base = if flags.archived {
        NamespaceState::Archived
    } else {
        NamespaceState::AncestorInherited
    };

    let mut preserved_states = BTreeMap::new();
    let mut state = base;

    if flags.marked_for_deletion_on.is_some() {
        preserved_states.insert(LifecycleEvent::ScheduleDeletion, state);
        state = NamespaceState::DeletionScheduled;
    }
    if flags.pending_delete {
        preserved_states.insert(LifecycleEvent::StartDeletion, state);
        state = NamespaceState::DeletionInProgress;
    }

    let deletion_schedule = state.has_active_deletion().then(|| {
        let marked_on = flags.marked_for_deletion_on.unwrap_or(today);
        DeletionSchedule {
            marked_for_deletion_on: marked_on,
            scheduled_by: flags.marked_for_deletion_by.unwrap_or(Actor::System),
            scheduled_at: Timestamp::start_of_day(marked_on),
        }
    });

    BackfilledState {
        state,
        preserved_states,
        deletion_schedule,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
    }

    #[test]
    fn test_null_decodes_to_inherited() {
        assert_eq!(decode_stored_state(None).unwrap(), NamespaceState::AncestorInherited);
    }

    #[test]
    fn test_zero_and_null_are_indistinguishable() {
        assert_eq!(decode_stored_state(None).unwrap(), decode_stored_state(Some(0)).unwrap());
    }

    #[test]
    fn test_unknown_code_is_an_error() {
        assert!(matches!(
            decode_stored_state(Some(999)),
            Err(StateDecodeError::UnknownCode(999))
        ));
    }

    #[test]
    fn test_encode_never_null() {
        assert_eq!(encode_state(NamespaceState::AncestorInherited), 0);
        assert_eq!(encode_state(NamespaceState::Maintenance), 6);
    }

    #[test]
    fn test_backfill_no_flags() {
        let out = backfill_state(&LegacyFlags::default(), today());
        assert_eq!(out.state, NamespaceState::AncestorInherited);
        assert!(out.preserved_states.is_empty());
        assert!(out.deletion_schedule.is_none());
    }

    #[test]
    fn test_backfill_archived_only() {
        let out = backfill_state(&LegacyFlags {
            archived: true,
            ..Default::default()
        }, today());
        assert_eq!(out.state, NamespaceState::Archived);
        assert!(out.preserved_states.is_empty());
    }

    #[test]
    fn test_backfill_scheduled_preserves_inherited() {
        let out = backfill_state(&LegacyFlags {
            marked_for_deletion_on: Some(today()),
            ..Default::default()
        }, today());
        assert_eq!(out.state, NamespaceState::DeletionScheduled);
        assert_eq!(
            out.preserved_states.get(&LifecycleEvent::ScheduleDeletion),
            Some(&NamespaceState::AncestorInherited)
        );
    }

    #[test]
    fn test_backfill_archived_and_scheduled() {
        let out = backfill_state(&LegacyFlags {
            archived: true,
            marked_for_deletion_on: Some(today()),
            ..Default::default()
        }, today());
        assert_eq!(out.state, NamespaceState::DeletionScheduled);
        assert_eq!(
            out.preserved_states.get(&LifecycleEvent::ScheduleDeletion),
            Some(&NamespaceState::Archived)
        );
    }

    #[test]
    fn test_backfill_archived_and_pending_delete() {
        let out = backfill_state(&LegacyFlags {
            archived: true,
            pending_delete: true,
            ..Default::default()
        }, today());
        assert_eq!(out.state, NamespaceState::DeletionInProgress);
        assert_eq!(out.preserved_states.len(), 1);
        let schedule = out.deletion_schedule.as_ref().unwrap();
        assert_eq!(schedule.marked_for_deletion_on, today());
        assert_eq!(schedule.scheduled_by, Actor::System);
        assert_eq!(
            out.preserved_states.get(&LifecycleEvent::StartDeletion),
            Some(&NamespaceState::Archived)
        );
    }

    #[test]
    fn test_backfill_full_chain() {
        let out = backfill_state(&LegacyFlags {
            archived: true,
            marked_for_deletion_on: Some(today()),
            marked_for_deletion_by: Some(Actor::System),
            pending_delete: true,
        }, today());
        assert_eq!(out.state, NamespaceState::DeletionInProgress);
        assert_eq!(
            out.preserved_states.get(&LifecycleEvent::ScheduleDeletion),
            Some(&NamespaceState::Archived)
        );
        assert_eq!(
            out.preserved_states.get(&LifecycleEvent::StartDeletion),
            Some(&NamespaceState::DeletionScheduled)
        );
    }

    #[test]
    fn test_apply_to_skips_explicit_states() {
        use crate::namespace::NamespaceKind;
        use nsl_core::NamespaceId;

        let flags = LegacyFlags {
            marked_for_deletion_on: Some(today()),
            ..Default::default()
        };

        let mut fresh = Namespace::new(
            NamespaceId(1),
            None,
            NamespaceKind::Group,
            Timestamp::now(),
        );
        assert!(backfill_state(&flags, today()).apply_to(&mut fresh));
        assert_eq!(fresh.state, NamespaceState::DeletionScheduled);
        assert!(fresh.check_invariants().is_ok());

        let mut archived = Namespace::new(
            NamespaceId(2),
            None,
            NamespaceKind::Group,
            Timestamp::now(),
        );
        archived.state = NamespaceState::Archived;
        assert!(!backfill_state(&flags, today()).apply_to(&mut archived));
        assert_eq!(archived.state, NamespaceState::Archived);
    }
}
