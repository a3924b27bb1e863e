//! # Lifecycle Properties
//!
//! Property tests over random event sequences, plus the end-to-end
//! lifecycle scenarios run against the pure engine.

use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;

use nsl_core::{Actor, CorrelationId, FixedClock, NamespaceId, Timestamp, UserId};
use nsl_state::{
    decode_stored_state, effective_pending_deletion, AncestorChain, AncestorRef,
    InstanceAdjournmentPolicy, LifecycleEngine, LifecycleEvent, Namespace, NamespaceKind,
    NamespaceState, TransitionContext, TransitionError, TransitionRecord,
};

fn start_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
}

fn engine_with(clock: Arc<FixedClock>, grace: i64) -> LifecycleEngine {
    LifecycleEngine::new(Arc::new(InstanceAdjournmentPolicy::new(true, grace)), clock)
        .with_hooks(Vec::new())
}

fn fixed_ctx() -> TransitionContext {
    TransitionContext::new(Actor::User(UserId(7))).with_correlation_id(CorrelationId::new("prop"))
}

fn namespace(kind: NamespaceKind) -> Namespace {
    Namespace::new(NamespaceId(1), None, kind, Timestamp::start_of_day(start_day()))
}

fn any_event() -> impl Strategy<Value = LifecycleEvent> {
    prop::sample::select(LifecycleEvent::ALL.to_vec())
}

/// An event plus the number of days to advance the clock before it.
fn any_step() -> impl Strategy<Value = (LifecycleEvent, i64)> {
    (any_event(), 0i64..10)
}

fn run(steps: &[(LifecycleEvent, i64)], kind: NamespaceKind) -> (Namespace, Vec<TransitionRecord>) {
    let clock = Arc::new(FixedClock::at_date(start_day()));
    let engine = engine_with(clock.clone(), 7);
    let mut ns = namespace(kind);
    let mut log: Vec<TransitionRecord> = Vec::new();
    for (event, days) in steps {
        clock.advance_days(*days);
        let _ =
            engine.apply_event(&mut ns, &AncestorChain::empty(), *event, &fixed_ctx(), &mut log);
    }
    (ns, log)
}

proptest! {
    /// Replaying the same sequence under the same clock yields the same
    /// namespace and the same audit trail.
    #[test]
    fn replay_is_deterministic(steps in prop::collection::vec(any_step(), 0..40)) {
        let (a, log_a) = run(&steps, NamespaceKind::Group);
        let (b, log_b) = run(&steps, NamespaceKind::Group);
        prop_assert_eq!(a, b);
        prop_assert_eq!(log_a, log_b);
    }

    /// A schedule exists exactly while the namespace is pending deletion,
    /// after every single step.
    #[test]
    fn schedule_present_iff_pending(steps in prop::collection::vec(any_step(), 0..40)) {
        let clock = Arc::new(FixedClock::at_date(start_day()));
        let engine = engine_with(clock.clone(), 7);
        let mut ns = namespace(NamespaceKind::Group);
        let mut log: Vec<TransitionRecord> = Vec::new();
        for (event, days) in steps {
            clock.advance_days(days);
            let _ =
                engine.apply_event(&mut ns, &AncestorChain::empty(), event, &fixed_ctx(), &mut log);
            prop_assert!(ns.check_invariants().is_ok(), "{:?}", ns.check_invariants());
        }
    }

    /// A refused event changes neither state, schedule, history nor version,
    /// and still appends exactly one failure record.
    #[test]
    fn refusals_do_not_mutate(
        steps in prop::collection::vec(any_step(), 0..30),
        event in any_event(),
    ) {
        let (mut ns, _) = run(&steps, NamespaceKind::Group);
        let clock = Arc::new(FixedClock::at_date(start_day()));
        let engine = engine_with(clock, 7);
        let before = ns.clone();
        let mut log: Vec<TransitionRecord> = Vec::new();
        if engine
            .apply_event(&mut ns, &AncestorChain::empty(), event, &fixed_ctx(), &mut log)
            .is_err()
        {
            prop_assert_eq!(ns.state, before.state);
            prop_assert_eq!(&ns.deletion_schedule, &before.deletion_schedule);
            prop_assert_eq!(&ns.metadata.preserved_states, &before.metadata.preserved_states);
            prop_assert_eq!(ns.lock_version, before.lock_version);
            prop_assert_eq!(log.len(), 1);
            prop_assert!(!log[0].is_success());
        }
    }

    /// Personal namespaces never reach `deletion_scheduled`.
    #[test]
    fn personal_never_scheduled(steps in prop::collection::vec(any_step(), 0..40)) {
        let (_, log) = run(&steps, NamespaceKind::Personal);
        prop_assert!(log
            .iter()
            .all(|r| !(r.is_success() && r.to_state == Some(NamespaceState::DeletionScheduled))));
    }

    /// Only the seven known codes and NULL decode.
    #[test]
    fn stored_codes_decode_or_fail(code in any::<i16>()) {
        match decode_stored_state(Some(code)) {
            Ok(state) => prop_assert_eq!(state.code(), code),
            Err(_) => prop_assert!(!(0..=6).contains(&code)),
        }
    }
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn scenario_archive_schedule_cancel_restores_archived() {
    let clock = Arc::new(FixedClock::at_date(start_day()));
    let engine = engine_with(clock, 7);
    let mut ns = namespace(NamespaceKind::Group);
    let chain = AncestorChain::empty();
    let mut log: Vec<TransitionRecord> = Vec::new();
    let u = TransitionContext::new(Actor::User(UserId(11)));

    engine.apply_event(&mut ns, &chain, LifecycleEvent::Archive, &u, &mut log).unwrap();
    engine.apply_event(&mut ns, &chain, LifecycleEvent::ScheduleDeletion, &u, &mut log).unwrap();
    let schedule = ns.deletion_schedule.clone().unwrap();
    assert_eq!(schedule.marked_for_deletion_on, start_day());
    assert_eq!(schedule.scheduled_by, Actor::User(UserId(11)));

    engine.apply_event(&mut ns, &chain, LifecycleEvent::CancelDeletion, &u, &mut log).unwrap();
    assert_eq!(ns.state, NamespaceState::Archived);
    assert!(ns.deletion_schedule.is_none());
    assert_eq!(log.len(), 3);
}

#[test]
fn scenario_ancestor_scheduled_blocks_descendant() {
    let clock = Arc::new(FixedClock::at_date(start_day()));
    let engine = engine_with(clock, 7);
    let mut child = namespace(NamespaceKind::Project);
    child.id = NamespaceId(2);
    child.parent_id = Some(NamespaceId(1));
    let chain = AncestorChain::new(vec![AncestorRef {
        id: NamespaceId(1),
        state: NamespaceState::DeletionScheduled,
    }]);

    let err = engine
        .apply_event(
            &mut child,
            &chain,
            LifecycleEvent::ScheduleDeletion,
            &fixed_ctx(),
            &mut Vec::<TransitionRecord>::new(),
        )
        .unwrap_err();
    assert!(matches!(err, TransitionError::GuardRejected { .. }));
    assert_eq!(effective_pending_deletion(&child, &chain).map(|a| a.id), Some(NamespaceId(1)));
}

#[test]
fn scenario_second_start_is_invalid() {
    let clock = Arc::new(FixedClock::at_date(start_day()));
    let engine = engine_with(clock.clone(), 7);
    let mut ns = namespace(NamespaceKind::Group);
    let chain = AncestorChain::empty();
    let mut log: Vec<TransitionRecord> = Vec::new();

    engine
        .apply_event(&mut ns, &chain, LifecycleEvent::ScheduleDeletion, &fixed_ctx(), &mut log)
        .unwrap();
    clock.advance_days(7);
    let system = TransitionContext::system();
    engine.apply_event(&mut ns, &chain, LifecycleEvent::StartDeletion, &system, &mut log).unwrap();
    let second =
        engine.apply_event(&mut ns, &chain, LifecycleEvent::StartDeletion, &system, &mut log);
    assert_eq!(
        second,
        Err(TransitionError::InvalidTransition {
            from: NamespaceState::DeletionInProgress,
            event: LifecycleEvent::StartDeletion,
        })
    );
}
