//! # Transition Guards
//!
//! A guard is a pure predicate attached to a transition rule. It sees the
//! namespace, its ancestor chain, and the adjournment policy, and either
//! allows the rule or names why not. Guards never mutate anything and never
//! touch storage; stale ancestor data at worst causes a transient rejection.

use std::fmt::Debug;

use crate::ancestry::AncestorChain;
use crate::event::LifecycleEvent;
use crate::namespace::Namespace;
use crate::policy::AdjournmentPolicy;
use crate::state::NamespaceState;

/// Everything a guard may inspect.
#[derive(Debug, Clone, Copy)]
pub struct GuardInput<'a> {
    pub namespace: &'a Namespace,
    pub ancestors: &'a AncestorChain,
    pub event: LifecycleEvent,
    pub policy: &'a dyn AdjournmentPolicy,
}

/// A predicate gating one transition rule.
pub trait Guard: Send + Sync + Debug {
    /// Stable name reported in rejections.
    fn name(&self) -> &'static str;

    /// `Ok(())` to allow, `Err(reason)` to refuse.
    fn check(&self, input: &GuardInput<'_>) -> Result<(), String>;
}

// ─── Ancestor State ──────────────────────────────────────────────────

/// Refuses when any ancestor is in one of the forbidden states.
#[derive(Debug, Clone)]
pub struct AncestorStateGuard {
    forbidden: &'static [NamespaceState],
}

const ARCHIVE_FORBIDDEN: &[NamespaceState] = &[
    NamespaceState::Archived,
    NamespaceState::DeletionInProgress,
    NamespaceState::DeletionScheduled,
];

const DELETION_FORBIDDEN: &[NamespaceState] = &[
    NamespaceState::DeletionInProgress,
    NamespaceState::DeletionScheduled,
];

impl AncestorStateGuard {
    pub fn new(forbidden: &'static [NamespaceState]) -> Self {
        Self { forbidden }
    }

    /// The forbidden ancestor states for an event, or `None` if the event
    /// does not care about its ancestors.
    pub fn for_event(event: LifecycleEvent) -> Option<Self> {
        match event {
            LifecycleEvent::Archive => Some(Self::new(ARCHIVE_FORBIDDEN)),
            LifecycleEvent::Unarchive | LifecycleEvent::ScheduleDeletion => {
                Some(Self::new(DELETION_FORBIDDEN))
            }
            _ => None,
        }
    }

    pub fn forbidden(&self) -> &'static [NamespaceState] {
        self.forbidden
    }
}

impl Guard for AncestorStateGuard {
    fn name(&self) -> &'static str {
        "ancestor_state"
    }

    fn check(&self, input: &GuardInput<'_>) -> Result<(), String> {
        match input.ancestors.nearest_in(self.forbidden) {
            Some(ancestor) => Err(format!(
                "cannot be changed as ancestor ID {} is {}",
                ancestor.id, ancestor.state
            )),
            None => Ok(()),
        }
    }
}

// ─── Adjournment ─────────────────────────────────────────────────────

/// Refuses entry into `deletion_scheduled` when the policy says deletion of
/// this namespace is immediate.
#[derive(Debug, Clone, Default)]
pub struct AdjournmentEnabledGuard;

impl Guard for AdjournmentEnabledGuard {
    fn name(&self) -> &'static str {
        "adjournment_enabled"
    }

    fn check(&self, input: &GuardInput<'_>) -> Result<(), String> {
        if input.policy.adjournment_enabled(input.namespace) {
            Ok(())
        } else {
            Err(format!(
                "adjourned deletion is not available for {} namespace {}",
                input.namespace.kind, input.namespace.id
            ))
        }
    }
}

// ─── History ─────────────────────────────────────────────────────────

/// Passes when the state recorded just before `event` equals `expected`.
#[derive(Debug, Clone)]
pub struct PreservedStateGuard {
    event: LifecycleEvent,
    expected: NamespaceState,
}

impl PreservedStateGuard {
    pub fn new(event: LifecycleEvent, expected: NamespaceState) -> Self {
        Self { event, expected }
    }
}

impl Guard for PreservedStateGuard {
    fn name(&self) -> &'static str {
        "preserved_state"
    }

    fn check(&self, input: &GuardInput<'_>) -> Result<(), String> {
        match input.namespace.metadata.preserved_state(self.event) {
            Some(state) if state == self.expected => Ok(()),
            Some(state) => Err(format!(
                "state before {} was {state}, not {}",
                self.event, self.expected
            )),
            None => Err(format!("no state recorded before {}", self.event)),
        }
    }
}

/// Passes when the namespace was in `expected` before its deletion began,
/// whether that was via scheduling or a direct start.
#[derive(Debug, Clone)]
pub struct StateBeforeDeletionGuard {
    expected: NamespaceState,
}

impl StateBeforeDeletionGuard {
    pub fn new(expected: NamespaceState) -> Self {
        Self { expected }
    }
}

impl Guard for StateBeforeDeletionGuard {
    fn name(&self) -> &'static str {
        "state_before_deletion"
    }

    fn check(&self, input: &GuardInput<'_>) -> Result<(), String> {
        match input.namespace.metadata.state_before_deletion() {
            Some(state) if state == self.expected => Ok(()),
            Some(state) => Err(format!("state before deletion was {state}, not {}", self.expected)),
            None => Err("no state recorded before deletion".to_string()),
        }
    }
}
