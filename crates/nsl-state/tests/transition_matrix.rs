//! # Namespace Lifecycle Transition Matrix
//!
//! Exhaustive state x event matrix. Every pair is applied to a namespace
//! with no restore history and no ancestors. Pairs in the table must land on
//! the expected state; every other pair must fail with `InvalidTransition`
//! and leave state, schedule and version untouched.

use std::sync::Arc;

use chrono::NaiveDate;

use nsl_core::{Actor, FixedClock, NamespaceId, Timestamp, UserId};
use nsl_state::{
    AncestorChain, DeletionSchedule, InstanceAdjournmentPolicy, LifecycleEngine, Namespace,
    NamespaceKind, TransitionContext, TransitionError, TransitionRecord,
};

use nsl_state::LifecycleEvent as E;
use nsl_state::NamespaceState as S;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 25).unwrap()
}

fn engine() -> LifecycleEngine {
    LifecycleEngine::new(
        Arc::new(InstanceAdjournmentPolicy::new(true, 7)),
        Arc::new(FixedClock::at_date(today())),
    )
    .with_hooks(Vec::new())
}

fn namespace_in(state: S) -> Namespace {
    let mut ns = Namespace::new(NamespaceId(10), None, NamespaceKind::Group, Timestamp::now());
    ns.state = state;
    if state.has_active_deletion() {
        let on = today() - chrono::Duration::days(30);
        ns.deletion_schedule = Some(DeletionSchedule {
            marked_for_deletion_on: on,
            scheduled_by: Actor::User(UserId(1)),
            scheduled_at: Timestamp::start_of_day(on),
        });
    }
    ns.lock_version = 3;
    ns
}

/// Expected target for each valid (state, event) pair with empty history.
fn expected_valid() -> Vec<(S, E, S)> {
    vec![
        (S::AncestorInherited, E::Archive, S::Archived),
        (S::AncestorInherited, E::Unarchive, S::AncestorInherited),
        (S::AncestorInherited, E::ScheduleDeletion, S::DeletionScheduled),
        (S::AncestorInherited, E::StartDeletion, S::DeletionInProgress),
        (S::AncestorInherited, E::RescheduleDeletion, S::DeletionScheduled),
        (S::AncestorInherited, E::CancelDeletion, S::AncestorInherited),
        (S::Archived, E::Unarchive, S::AncestorInherited),
        (S::Archived, E::ScheduleDeletion, S::DeletionScheduled),
        (S::Archived, E::StartDeletion, S::DeletionInProgress),
        (S::DeletionScheduled, E::StartDeletion, S::DeletionInProgress),
        (S::DeletionScheduled, E::CancelDeletion, S::AncestorInherited),
        (S::DeletionInProgress, E::RescheduleDeletion, S::DeletionScheduled),
        (S::DeletionInProgress, E::CancelDeletion, S::AncestorInherited),
    ]
}

#[test]
fn lifecycle_transition_matrix_exhaustive() {
    let engine = engine();
    let valid = expected_valid();

    for from in S::ALL {
        for event in E::ALL {
            let mut ns = namespace_in(from);
            let before = ns.clone();
            let mut log: Vec<TransitionRecord> = Vec::new();
            let ctx = TransitionContext::new(Actor::User(UserId(5)));

            let result =
                engine.apply_event(&mut ns, &AncestorChain::empty(), event, &ctx, &mut log);
            let expected = valid
                .iter()
                .find(|(f, e, _)| *f == from && *e == event)
                .map(|(_, _, to)| *to);

            match expected {
                Some(to) => {
                    assert_eq!(result, Ok(to), "{from} --{event}--> expected {to}");
                    assert_eq!(ns.state, to);
                    assert_eq!(ns.lock_version, before.lock_version + 1);
                    assert!(
                        ns.check_invariants().is_ok(),
                        "{from} --{event}--> broke schedule invariant"
                    );
                }
                None => {
                    assert_eq!(
                        result,
                        Err(TransitionError::InvalidTransition { from, event }),
                        "{from} --{event}--> should be invalid"
                    );
                    assert_eq!(ns.state, before.state);
                    assert_eq!(ns.deletion_schedule, before.deletion_schedule);
                    assert_eq!(ns.lock_version, before.lock_version);
                    assert!(ns.metadata.last_error.is_some());
                }
            }
            assert_eq!(log.len(), 1, "{from} --{event}--> must log exactly once");
        }
    }
}

#[test]
fn lifecycle_foreign_states_reject_every_event() {
    let engine = engine();
    for from in [S::CreationInProgress, S::TransferInProgress, S::Maintenance] {
        assert!(engine.table().events_from(from).is_empty());
        for event in E::ALL {
            let ns = namespace_in(from);
            let result =
                engine.evaluate(&ns, &AncestorChain::empty(), event, &TransitionContext::system());
            assert!(matches!(result, Err(TransitionError::InvalidTransition { .. })));
        }
    }
}

#[test]
fn lifecycle_unarchive_on_inherited_leaves_schedule_untouched() {
    let engine = engine();
    let mut ns = namespace_in(S::AncestorInherited);
    let to = engine
        .apply_event(
            &mut ns,
            &AncestorChain::empty(),
            E::Unarchive,
            &TransitionContext::system(),
            &mut Vec::<TransitionRecord>::new(),
        )
        .unwrap();
    assert_eq!(to, S::AncestorInherited);
    assert!(ns.deletion_schedule.is_none());
}

#[test]
fn lifecycle_schedule_is_cleared_on_every_exit() {
    let engine = engine();
    for (from, event) in [
        (S::DeletionScheduled, E::CancelDeletion),
        (S::DeletionInProgress, E::CancelDeletion),
    ] {
        let mut ns = namespace_in(from);
        engine
            .apply_event(
                &mut ns,
                &AncestorChain::empty(),
                event,
                &TransitionContext::system(),
                &mut Vec::<TransitionRecord>::new(),
            )
            .unwrap();
        assert!(ns.deletion_schedule.is_none(), "{from} --{event}--> kept a schedule");
    }
}

#[test]
fn lifecycle_every_state_code_round_trips() {
    for state in S::ALL {
        assert_eq!(S::from_code(state.code()), Some(state));
        assert_eq!(S::from_name(state.as_str()), Some(state));
    }
}
