//! # Namespace Store
//!
//! Persistence contract for namespaces and their transition audit trail.
//!
//! Every state change goes through [`NamespaceStore::commit`], a
//! compare-and-set on `lock_version` that writes the namespace and its audit
//! record together. Rejections go through
//! [`NamespaceStore::record_rejection`], which always appends the audit
//! record but writes failure metadata only onto the version the caller read.

use std::collections::HashSet;
use std::fmt::Debug;

use async_trait::async_trait;
use chrono::NaiveDate;

use nsl_core::NamespaceId;
use nsl_state::{AncestorChain, AncestorRef, Namespace, TransitionPlan, TransitionRecord};

use crate::error::StoreError;

#[async_trait]
pub trait NamespaceStore: Send + Sync + Debug {
    async fn get(&self, id: NamespaceId) -> Result<Option<Namespace>, StoreError>;

    /// Add a new namespace. Fails with [`StoreError::AlreadyExists`] if the
    /// id is taken.
    async fn insert(&self, namespace: &Namespace) -> Result<(), StoreError>;

    /// Replace the stored namespace if its `lock_version` still equals
    /// `expected_version`, appending `record` in the same atomic step.
    async fn commit(
        &self,
        expected_version: u64,
        namespace: &Namespace,
        record: Option<&TransitionRecord>,
    ) -> Result<(), StoreError>;

    /// Append the record of a refused transition. Its failure bookkeeping is
    /// written onto the namespace only if `lock_version` still equals
    /// `expected_version`; a row another caller has since committed keeps its
    /// metadata. Returns whether the metadata was written. State, schedule
    /// and version are never touched.
    async fn record_rejection(
        &self,
        expected_version: u64,
        record: &TransitionRecord,
    ) -> Result<bool, StoreError>;

    /// Namespaces in `deletion_scheduled` marked on or before `cutoff`, with
    /// id greater than `after`, in id order, at most `limit`.
    async fn scan_deletion_due(
        &self,
        cutoff: NaiveDate,
        after: Option<NamespaceId>,
        limit: usize,
    ) -> Result<Vec<Namespace>, StoreError>;

    /// Audit records of one namespace in append order.
    async fn transitions(&self, id: NamespaceId) -> Result<Vec<TransitionRecord>, StoreError>;

    /// Ancestors of `namespace`, nearest first. The default walks parent
    /// links one lookup at a time; stores with a hierarchy index override it.
    async fn ancestor_chain(
        &self,
        namespace: &Namespace,
        max_depth: usize,
    ) -> Result<AncestorChain, StoreError> {
        walk_parents(self, namespace, max_depth).await
    }

    /// Commit a plan produced by the engine.
    async fn commit_transition(&self, plan: &TransitionPlan) -> Result<(), StoreError> {
        self.commit(plan.expected_version, &plan.updated, Some(&plan.record))
            .await
    }
}

/// Walk parent links upwards, one `get` per hop.
///
/// Stops at a root or at a dangling parent id. A chain longer than
/// `max_depth`, or one that revisits a namespace, is an error.
pub async fn walk_parents<S>(
    store: &S,
    namespace: &Namespace,
    max_depth: usize,
) -> Result<AncestorChain, StoreError>
where
    S: NamespaceStore + ?Sized,
{
    let mut seen = HashSet::from([namespace.id]);
    let mut ancestors = Vec::new();
    let mut next = namespace.parent_id;

    while let Some(parent_id) = next {
        if !seen.insert(parent_id) {
            return Err(StoreError::HierarchyCycle(namespace.id));
        }
        if ancestors.len() >= max_depth {
            return Err(StoreError::DepthExceeded {
                namespace_id: namespace.id,
                max_depth,
            });
        }
        match store.get(parent_id).await? {
            Some(parent) => {
                ancestors.push(AncestorRef::of(&parent));
                next = parent.parent_id;
            }
            None => {
                tracing::warn!(
                    namespace_id = %namespace.id,
                    parent_id = %parent_id,
                    "dangling parent reference, treating as root"
                );
                next = None;
            }
        }
    }

    Ok(AncestorChain::new(ancestors))
}
