//! # Transition Table
//!
//! `(state, event) -> [rule]`. Rules for a pair are tried in order and the
//! first whose guards all pass is taken. A pair with no rules is an invalid
//! transition. A pair whose every rule is refused is a guard rejection.
//!
//! | Event | From | To (in evaluation order) |
//! |---|---|---|
//! | `archive` | inherited | archived |
//! | `unarchive` | archived, inherited | inherited |
//! | `schedule_deletion` | inherited, archived | deletion_scheduled |
//! | `start_deletion` | inherited, archived, deletion_scheduled | deletion_in_progress |
//! | `reschedule_deletion` | deletion_in_progress | inherited, archived, deletion_scheduled (kept), deletion_scheduled (fresh) |
//! | `reschedule_deletion` | inherited | deletion_scheduled |
//! | `cancel_deletion` | deletion_scheduled, deletion_in_progress | archived, inherited |
//! | `cancel_deletion` | inherited | archived, inherited |
//!
//! `creation_in_progress`, `transfer_in_progress` and `maintenance` belong
//! to other subsystems and have no rules here.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::event::LifecycleEvent;
use crate::guard::{
    AdjournmentEnabledGuard, AncestorStateGuard, Guard, PreservedStateGuard,
    StateBeforeDeletionGuard,
};
use crate::state::NamespaceState;

use crate::event::LifecycleEvent as E;
use crate::state::NamespaceState as S;

/// How a rule treats the deletion schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleEffect {
    /// Create on entry into the deletion states, keep while moving between
    /// them, clear on exit.
    Derived,
    /// Replace any existing schedule with one stamped now.
    Restamp,
}

/// One candidate target for a (state, event) pair.
#[derive(Debug, Clone)]
pub struct TransitionRule {
    pub to: NamespaceState,
    /// Short name for logs and diagnostics.
    pub label: &'static str,
    pub guards: Vec<Arc<dyn Guard>>,
    pub schedule: ScheduleEffect,
}

impl TransitionRule {
    pub fn to(to: NamespaceState, label: &'static str) -> Self {
        Self {
            to,
            label,
            guards: Vec::new(),
            schedule: ScheduleEffect::Derived,
        }
    }

    pub fn guarded_by(mut self, guard: impl Guard + 'static) -> Self {
        self.guards.push(Arc::new(guard));
        self
    }

    pub fn restamping(mut self) -> Self {
        self.schedule = ScheduleEffect::Restamp;
        self
    }
}

/// The full rule set of the lifecycle machine.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    rules: BTreeMap<(NamespaceState, LifecycleEvent), Vec<TransitionRule>>,
}

impl TransitionTable {
    /// A table with no rules.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append a rule after any existing rules for the pair.
    pub fn add(&mut self, from: NamespaceState, event: LifecycleEvent, rule: TransitionRule) {
        self.rules.entry((from, event)).or_default().push(rule);
    }

    pub fn rules_for(&self, from: NamespaceState, event: LifecycleEvent) -> &[TransitionRule] {
        self.rules
            .get(&(from, event))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_rule(&self, from: NamespaceState, event: LifecycleEvent) -> bool {
        !self.rules_for(from, event).is_empty()
    }

    /// Every target reachable from `from` via `event`, in evaluation order.
    pub fn targets(&self, from: NamespaceState, event: LifecycleEvent) -> Vec<NamespaceState> {
        self.rules_for(from, event).iter().map(|r| r.to).collect()
    }

    /// Events that have at least one rule from `from`.
    pub fn events_from(&self, from: NamespaceState) -> Vec<LifecycleEvent> {
        LifecycleEvent::ALL
            .into_iter()
            .filter(|e| self.has_rule(from, *e))
            .collect()
    }

    /// The namespace lifecycle rules.
    pub fn standard() -> Self {
        let mut t = Self::empty();

        let ancestors = |event| {
            AncestorStateGuard::for_event(event)
                .unwrap_or_else(|| AncestorStateGuard::new(&[]))
        };

        // archive / unarchive
        t.add(
            S::AncestorInherited,
            E::Archive,
            TransitionRule::to(S::Archived, "archive").guarded_by(ancestors(E::Archive)),
        );
        t.add(
            S::Archived,
            E::Unarchive,
            TransitionRule::to(S::AncestorInherited, "unarchive")
                .guarded_by(ancestors(E::Unarchive)),
        );
        t.add(
            S::AncestorInherited,
            E::Unarchive,
            TransitionRule::to(S::AncestorInherited, "unarchive_noop")
                .guarded_by(ancestors(E::Unarchive)),
        );

        // schedule_deletion
        for from in [S::AncestorInherited, S::Archived] {
            t.add(
                from,
                E::ScheduleDeletion,
                TransitionRule::to(S::DeletionScheduled, "schedule_deletion")
                    .guarded_by(ancestors(E::ScheduleDeletion))
                    .guarded_by(AdjournmentEnabledGuard),
            );
        }

        // start_deletion
        for from in [S::AncestorInherited, S::Archived, S::DeletionScheduled] {
            t.add(
                from,
                E::StartDeletion,
                TransitionRule::to(S::DeletionInProgress, "start_deletion"),
            );
        }

        // reschedule_deletion
        t.add(
            S::DeletionInProgress,
            E::RescheduleDeletion,
            TransitionRule::to(S::AncestorInherited, "restore_to_inherited")
                .guarded_by(PreservedStateGuard::new(E::StartDeletion, S::AncestorInherited)),
        );
        t.add(
            S::DeletionInProgress,
            E::RescheduleDeletion,
            TransitionRule::to(S::Archived, "restore_to_archived")
                .guarded_by(PreservedStateGuard::new(E::StartDeletion, S::Archived)),
        );
        t.add(
            S::DeletionInProgress,
            E::RescheduleDeletion,
            TransitionRule::to(S::DeletionScheduled, "restore_to_scheduled")
                .guarded_by(PreservedStateGuard::new(E::StartDeletion, S::DeletionScheduled)),
        );
        t.add(
            S::DeletionInProgress,
            E::RescheduleDeletion,
            TransitionRule::to(S::DeletionScheduled, "reschedule")
                .guarded_by(AdjournmentEnabledGuard)
                .restamping(),
        );
        t.add(
            S::AncestorInherited,
            E::RescheduleDeletion,
            TransitionRule::to(S::DeletionScheduled, "reschedule")
                .guarded_by(ancestors(E::ScheduleDeletion))
                .guarded_by(AdjournmentEnabledGuard),
        );

        // cancel_deletion
        for from in [S::DeletionScheduled, S::DeletionInProgress, S::AncestorInherited] {
            t.add(
                from,
                E::CancelDeletion,
                TransitionRule::to(S::Archived, "restore_to_archived_on_cancel")
                    .guarded_by(StateBeforeDeletionGuard::new(S::Archived)),
            );
            t.add(
                from,
                E::CancelDeletion,
                TransitionRule::to(S::AncestorInherited, "cancel_deletion"),
            );
        }

        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_states_have_no_rules() {
        let table = TransitionTable::standard();
        for state in [S::CreationInProgress, S::TransferInProgress, S::Maintenance] {
            assert!(table.events_from(state).is_empty(), "{state}");
        }
    }

    #[test]
    fn test_reschedule_candidates_in_order() {
        let table = TransitionTable::standard();
        assert_eq!(
            table.targets(S::DeletionInProgress, E::RescheduleDeletion),
            vec![S::AncestorInherited, S::Archived, S::DeletionScheduled, S::DeletionScheduled]
        );
        let last = table.rules_for(S::DeletionInProgress, E::RescheduleDeletion).last().unwrap();
        assert_eq!(last.schedule, ScheduleEffect::Restamp);
    }

    #[test]
    fn test_cancel_prefers_archived_restore() {
        let table = TransitionTable::standard();
        for from in [S::DeletionScheduled, S::DeletionInProgress, S::AncestorInherited] {
            assert_eq!(
                table.targets(from, E::CancelDeletion),
                vec![S::Archived, S::AncestorInherited]
            );
        }
    }

    #[test]
    fn test_archived_events() {
        let table = TransitionTable::standard();
        assert_eq!(
            table.events_from(S::Archived),
            vec![E::Unarchive, E::ScheduleDeletion, E::StartDeletion]
        );
    }

    #[test]
    fn test_add_appends_in_order() {
        let mut table = TransitionTable::empty();
        table.add(S::Maintenance, E::Archive, TransitionRule::to(S::Archived, "a"));
        table.add(S::Maintenance, E::Archive, TransitionRule::to(S::AncestorInherited, "b"));
        let labels: Vec<_> = table
            .rules_for(S::Maintenance, E::Archive)
            .iter()
            .map(|r| r.label)
            .collect();
        assert_eq!(labels, vec!["a", "b"]);
    }
}
