//! # Lifecycle Engine
//!
//! Applies [`LifecycleEvent`]s to namespaces using a [`TransitionTable`].
//!
//! The engine is split in two layers:
//!
//! - [`LifecycleEngine::evaluate`] is pure. Given a namespace snapshot and
//!   its ancestor chain it returns a [`TransitionPlan`] holding the fully
//!   updated namespace and the audit record, or the structured refusal.
//!   Nothing is mutated and no hooks run.
//! - [`LifecycleEngine::apply_event`] evaluates, mutates an in-memory
//!   namespace, appends to a [`TransitionLog`], and runs the hooks. Stores
//!   that need compare-and-set semantics use `evaluate` directly and commit
//!   the plan themselves.
//!
//! ## Schedule and history handling
//!
//! On success the plan:
//! - creates a [`DeletionSchedule`] stamped with the actor and the clock's
//!   date when entering `deletion_scheduled`/`deletion_in_progress` from
//!   outside them, keeps it while moving between them, and clears it on exit;
//! - records the state held before `schedule_deletion` and `start_deletion`
//!   in `preserved_states`, and drops that history once it has been used;
//! - refreshes the transition metadata and bumps `lock_version`.

use std::sync::Arc;

use nsl_core::{Actor, Clock, CorrelationId};

use crate::ancestry::AncestorChain;
use crate::audit::{TransitionLog, TransitionRecord};
use crate::error::TransitionError;
use crate::event::LifecycleEvent;
use crate::guard::GuardInput;
use crate::hook::{TracingHook, TransitionHook};
use crate::namespace::{DeletionSchedule, Namespace};
use crate::policy::AdjournmentPolicy;
use crate::state::NamespaceState;
use crate::table::{ScheduleEffect, TransitionRule, TransitionTable};

/// Who is acting and under which correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionContext {
    pub actor: Actor,
    pub correlation_id: CorrelationId,
}

impl TransitionContext {
    /// Context with a freshly generated correlation id.
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            correlation_id: CorrelationId::generate(),
        }
    }

    /// Scheduler-driven context.
    pub fn system() -> Self {
        Self::new(Actor::System)
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}

/// The result of a successful evaluation, ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub event: LifecycleEvent,
    pub from: NamespaceState,
    pub to: NamespaceState,
    /// Label of the rule that matched.
    pub rule: &'static str,
    /// `lock_version` the plan was computed against.
    pub expected_version: u64,
    /// The namespace as it will be after commit, version already bumped.
    pub updated: Namespace,
    pub record: TransitionRecord,
}

/// The namespace lifecycle state machine.
#[derive(Debug, Clone)]
pub struct LifecycleEngine {
    table: TransitionTable,
    policy: Arc<dyn AdjournmentPolicy>,
    clock: Arc<dyn Clock>,
    hooks: Vec<Arc<dyn TransitionHook>>,
}

impl LifecycleEngine {
    /// Standard rules with tracing hooks.
    pub fn new(policy: Arc<dyn AdjournmentPolicy>, clock: Arc<dyn Clock>) -> Self {
        Self {
            table: TransitionTable::standard(),
            policy,
            clock,
            hooks: vec![Arc::new(TracingHook)],
        }
    }

    pub fn with_table(mut self, table: TransitionTable) -> Self {
        self.table = table;
        self
    }

    /// Add a hook after the existing ones.
    pub fn with_hook(mut self, hook: Arc<dyn TransitionHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Replace all hooks.
    pub fn with_hooks(mut self, hooks: Vec<Arc<dyn TransitionHook>>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn policy(&self) -> &dyn AdjournmentPolicy {
        self.policy.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Decide what `event` would do to `namespace`. Pure.
    pub fn evaluate(
        &self,
        namespace: &Namespace,
        ancestors: &AncestorChain,
        event: LifecycleEvent,
        ctx: &TransitionContext,
    ) -> Result<TransitionPlan, TransitionError> {
        let from = namespace.state;
        let rules = self.table.rules_for(from, event);
        if rules.is_empty() {
            return Err(TransitionError::InvalidTransition { from, event });
        }

        let input = GuardInput {
            namespace,
            ancestors,
            event,
            policy: self.policy.as_ref(),
        };

        let mut refusal = None;
        for rule in rules {
            let failed = rule
                .guards
                .iter()
                .find_map(|g| g.check(&input).err().map(|reason| (g.name(), reason)));
            match failed {
                None => return Ok(self.plan(namespace, event, rule, ctx)),
                Some((guard, reason)) => {
                    refusal = Some(TransitionError::GuardRejected {
                        from,
                        to: rule.to,
                        event,
                        guard,
                        reason,
                    });
                }
            }
        }

        Err(refusal.unwrap_or(TransitionError::InvalidTransition { from, event }))
    }

    fn plan(
        &self,
        namespace: &Namespace,
        event: LifecycleEvent,
        rule: &TransitionRule,
        ctx: &TransitionContext,
    ) -> TransitionPlan {
        let now = self.clock.now();
        let from = namespace.state;
        let to = rule.to;

        let mut next = namespace.clone();
        next.state = to;
        next.deletion_schedule = next_schedule(namespace, to, rule.schedule, || DeletionSchedule {
            marked_for_deletion_on: self.clock.today(),
            scheduled_by: ctx.actor,
            scheduled_at: now,
        });

        let preserved = &mut next.metadata.preserved_states;
        if to.has_active_deletion() {
            if !from.has_active_deletion() && to == NamespaceState::DeletionScheduled {
                preserved.insert(LifecycleEvent::ScheduleDeletion, from);
            }
            if event == LifecycleEvent::StartDeletion {
                preserved.insert(LifecycleEvent::StartDeletion, from);
            }
            if from == NamespaceState::DeletionInProgress {
                preserved.remove(&LifecycleEvent::StartDeletion);
            }
        } else {
            preserved.remove(&LifecycleEvent::ScheduleDeletion);
            preserved.remove(&LifecycleEvent::StartDeletion);
        }

        next.metadata.last_transition_at = Some(now);
        next.metadata.last_changed_by = ctx.actor.user_id();
        next.metadata.last_error = None;
        next.metadata.correlation_id = Some(ctx.correlation_id.clone());
        next.lock_version = namespace.lock_version + 1;

        let record = TransitionRecord::success(
            namespace.id,
            event,
            from,
            to,
            ctx.actor,
            ctx.correlation_id.clone(),
            now,
        );

        TransitionPlan {
            event,
            from,
            to,
            rule: rule.label,
            expected_version: namespace.lock_version,
            updated: next,
            record,
        }
    }

    /// The audit record for a refused event.
    pub fn failure_record(
        &self,
        namespace: &Namespace,
        event: LifecycleEvent,
        ctx: &TransitionContext,
        error: &TransitionError,
    ) -> TransitionRecord {
        TransitionRecord::failure(
            namespace.id,
            event,
            namespace.state,
            ctx.actor,
            ctx.correlation_id.clone(),
            self.clock.now(),
            error,
        )
    }

    pub fn notify_success(&self, record: &TransitionRecord) {
        for hook in &self.hooks {
            hook.on_success(record);
        }
    }

    pub fn notify_failure(&self, record: &TransitionRecord, error: &TransitionError) {
        for hook in &self.hooks {
            hook.on_failure(record, error);
        }
    }

    /// Apply `event` to an in-memory namespace.
    ///
    /// On success the namespace is replaced by the planned one. On failure
    /// only the failure metadata changes; state, schedule and version stay
    /// as they were. Either way one record is appended to `log`.
    pub fn apply_event(
        &self,
        namespace: &mut Namespace,
        ancestors: &AncestorChain,
        event: LifecycleEvent,
        ctx: &TransitionContext,
        log: &mut dyn TransitionLog,
    ) -> Result<NamespaceState, TransitionError> {
        match self.evaluate(namespace, ancestors, event, ctx) {
            Ok(plan) => {
                let TransitionPlan {
                    to,
                    updated,
                    record,
                    ..
                } = plan;
                *namespace = updated;
                self.notify_success(&record);
                log.append(record);
                Ok(to)
            }
            Err(error) => {
                let record = self.failure_record(namespace, event, ctx, &error);
                note_rejection(namespace, &record);
                self.notify_failure(&record, &error);
                log.append(record);
                Err(error)
            }
        }
    }
}

fn next_schedule(
    namespace: &Namespace,
    to: NamespaceState,
    effect: ScheduleEffect,
    fresh: impl FnOnce() -> DeletionSchedule,
) -> Option<DeletionSchedule> {
    let from_active = namespace.state.has_active_deletion();
    match (from_active, to.has_active_deletion(), effect) {
        (_, true, ScheduleEffect::Restamp) | (false, true, ScheduleEffect::Derived) => {
            Some(fresh())
        }
        (true, true, ScheduleEffect::Derived) => namespace
            .deletion_schedule
            .clone()
            .or_else(|| Some(fresh())),
        (true, false, _) => None,
        (false, false, _) => namespace.deletion_schedule.clone(),
    }
}

/// Write the failure bookkeeping of `record` onto the namespace. State,
/// schedule and `lock_version` are untouched.
pub fn note_rejection(namespace: &mut Namespace, record: &TransitionRecord) {
    namespace.metadata.last_error = record.error_message();
    namespace.metadata.last_changed_by = record.actor.user_id();
    namespace.metadata.correlation_id = Some(record.correlation_id.clone());
}

/// Replay `events` from a namespace's current state, stopping at the first
/// refusal. Returns the states visited after each applied event.
pub fn replay(
    engine: &LifecycleEngine,
    namespace: &mut Namespace,
    ancestors: &AncestorChain,
    events: &[LifecycleEvent],
    ctx: &TransitionContext,
) -> Result<Vec<NamespaceState>, TransitionError> {
    let mut log: Vec<TransitionRecord> = Vec::new();
    events
        .iter()
        .map(|event| engine.apply_event(namespace, ancestors, *event, ctx, &mut log))
        .collect()
}
