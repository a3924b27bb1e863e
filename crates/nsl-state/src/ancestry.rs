//! # Ancestor Chains
//!
//! An [`AncestorChain`] is the list of a namespace's ancestors ordered
//! nearest-first (parent, grandparent, ...). Resolvers in the store crate
//! build it; everything here is pure and works on an already-loaded chain.
//!
//! Ordering is by proximity in the tree. Ids say nothing about depth and are
//! never used to order ancestors.

use serde::{Deserialize, Serialize};

use nsl_core::NamespaceId;

use crate::namespace::Namespace;
use crate::state::NamespaceState;

/// An ancestor (or the namespace itself) together with its stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorRef {
    pub id: NamespaceId,
    pub state: NamespaceState,
}

impl AncestorRef {
    pub fn of(namespace: &Namespace) -> Self {
        Self {
            id: namespace.id,
            state: namespace.state,
        }
    }
}

/// Ancestors of one namespace, nearest first. Does not include the
/// namespace itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorChain {
    ancestors: Vec<AncestorRef>,
}

impl AncestorChain {
    pub fn new(ancestors: Vec<AncestorRef>) -> Self {
        Self { ancestors }
    }

    /// The chain of a root namespace.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ancestors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ancestors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AncestorRef> {
        self.ancestors.iter()
    }

    pub fn parent(&self) -> Option<&AncestorRef> {
        self.ancestors.first()
    }

    /// Nearest ancestor whose state is one of `states`.
    pub fn nearest_in(&self, states: &[NamespaceState]) -> Option<&AncestorRef> {
        self.ancestors.iter().find(|a| states.contains(&a.state))
    }

    /// Nearest ancestor holding an explicit (non-inherited) state.
    pub fn nearest_explicit(&self) -> Option<&AncestorRef> {
        self.ancestors.iter().find(|a| a.state.is_explicit())
    }
}

impl FromIterator<AncestorRef> for AncestorChain {
    fn from_iter<I: IntoIterator<Item = AncestorRef>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// First node among self, parent, grandparent, ... with an active deletion
/// schedule.
pub fn effective_pending_deletion(
    namespace: &Namespace,
    chain: &AncestorChain,
) -> Option<AncestorRef> {
    if namespace.state.has_active_deletion() {
        return Some(AncestorRef::of(namespace));
    }
    chain
        .iter()
        .find(|a| a.state.has_active_deletion())
        .copied()
}

/// The state a reader should treat the namespace as being in: its own state
/// if explicit, else the nearest explicit ancestor's, else
/// `ancestor_inherited`.
pub fn effective_state(namespace: &Namespace, chain: &AncestorChain) -> NamespaceState {
    if namespace.state.is_explicit() {
        return namespace.state;
    }
    chain
        .nearest_explicit()
        .map(|a| a.state)
        .unwrap_or(NamespaceState::AncestorInherited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::{DeletionSchedule, NamespaceKind};
    use nsl_core::{Actor, Timestamp};

    fn ns(id: i64, state: NamespaceState) -> Namespace {
        let mut n = Namespace::new(
            NamespaceId(id),
            Some(NamespaceId(id - 1)),
            NamespaceKind::Group,
            Timestamp::now(),
        );
        n.state = state;
        if state.has_active_deletion() {
            let today = chrono::Utc::now().date_naive();
            n.deletion_schedule = Some(DeletionSchedule {
                marked_for_deletion_on: today,
                scheduled_by: Actor::System,
                scheduled_at: Timestamp::now(),
            });
        }
        n
    }

    fn anc(id: i64, state: NamespaceState) -> AncestorRef {
        AncestorRef {
            id: NamespaceId(id),
            state,
        }
    }

    // ── effective_pending_deletion ───────────────────────────────────

    #[test]
    fn test_pending_deletion_none_for_clean_chain() {
        let chain = AncestorChain::new(vec![
            anc(2, NamespaceState::Archived),
            anc(1, NamespaceState::AncestorInherited),
        ]);
        assert_eq!(
            effective_pending_deletion(&ns(3, NamespaceState::AncestorInherited), &chain),
            None
        );
    }

    #[test]
    fn test_pending_deletion_prefers_self() {
        let chain = AncestorChain::new(vec![anc(1, NamespaceState::DeletionInProgress)]);
        let me = ns(5, NamespaceState::DeletionScheduled);
        assert_eq!(effective_pending_deletion(&me, &chain).map(|a| a.id), Some(NamespaceId(5)));
    }

    #[test]
    fn test_pending_deletion_finds_nearest_ancestor() {
        let chain = AncestorChain::new(vec![
            anc(10, NamespaceState::AncestorInherited),
            anc(20, NamespaceState::DeletionScheduled),
            anc(1, NamespaceState::DeletionInProgress),
        ]);
        let hit =
            effective_pending_deletion(&ns(30, NamespaceState::AncestorInherited), &chain).unwrap();
        assert_eq!(hit, anc(20, NamespaceState::DeletionScheduled));
    }

    // ── effective_state ──────────────────────────────────────────────

    #[test]
    fn test_effective_state_own_explicit_state_wins() {
        let chain = AncestorChain::new(vec![anc(1, NamespaceState::DeletionScheduled)]);
        assert_eq!(
            effective_state(&ns(2, NamespaceState::Archived), &chain),
            NamespaceState::Archived
        );
    }

    #[test]
    fn test_effective_state_uses_proximity_not_id() {
        // Parent has a larger id than the grandparent and must still win.
        let chain = AncestorChain::new(vec![
            anc(90, NamespaceState::Archived),
            anc(3, NamespaceState::DeletionScheduled),
        ]);
        assert_eq!(
            effective_state(&ns(100, NamespaceState::AncestorInherited), &chain),
            NamespaceState::Archived
        );
    }

    #[test]
    fn test_effective_state_all_inherited() {
        let chain: AncestorChain = [anc(1, NamespaceState::AncestorInherited)]
            .into_iter()
            .collect();
        assert_eq!(
            effective_state(&ns(2, NamespaceState::AncestorInherited), &chain),
            NamespaceState::AncestorInherited
        );
        assert_eq!(
            effective_state(&ns(2, NamespaceState::AncestorInherited), &AncestorChain::empty()),
            NamespaceState::AncestorInherited
        );
    }

    #[test]
    fn test_nearest_in() {
        let chain = AncestorChain::new(vec![
            anc(4, NamespaceState::Maintenance),
            anc(2, NamespaceState::Archived),
        ]);
        assert_eq!(
            chain.nearest_in(&[NamespaceState::Archived]).map(|a| a.id),
            Some(NamespaceId(2))
        );
        assert!(chain.nearest_in(&[NamespaceState::DeletionScheduled]).is_none());
        assert_eq!(chain.parent().map(|a| a.id), Some(NamespaceId(4)));
    }
}
