//! # Lifecycle Service
//!
//! Runs lifecycle events against a [`NamespaceStore`]: load the namespace,
//! resolve its ancestors, evaluate the event with the [`LifecycleEngine`],
//! then commit the plan with a compare-and-set on `lock_version`.
//!
//! Every invocation that reaches a stored namespace leaves exactly one audit
//! record. A refused event writes its failure bookkeeping through
//! [`NamespaceStore::record_rejection`], against the version this call read:
//! a caller that lost a race, or evaluated a stale read, leaves the winner's
//! metadata alone. If even that write fails the original error is still
//! returned to the caller.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use nsl_core::{Clock, LifecycleConfig, NamespaceId};
use nsl_state::{
    backfill_state, effective_pending_deletion, effective_state, AncestorRef,
    InstanceAdjournmentPolicy, LegacyFlags, LifecycleEngine, LifecycleEvent, Namespace,
    NamespaceState, TransitionContext, TransitionError, TransitionRecord,
};

use crate::error::StoreError;
use crate::resolver::{AncestorResolver, StoreIndexedResolver};
use crate::store::NamespaceStore;

/// Read model combining stored and derived lifecycle information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceStatus {
    pub namespace: Namespace,
    /// State after resolving ancestor inheritance.
    pub effective_state: NamespaceState,
    /// Nearest ancestor-or-self with an active deletion schedule.
    pub pending_deletion: Option<AncestorRef>,
    /// First day the namespace's own schedule is eligible to start.
    pub permanent_deletion_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct LifecycleService {
    store: Arc<dyn NamespaceStore>,
    resolver: Arc<dyn AncestorResolver>,
    engine: LifecycleEngine,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn NamespaceStore>,
        resolver: Arc<dyn AncestorResolver>,
        engine: LifecycleEngine,
    ) -> Self {
        Self {
            store,
            resolver,
            engine,
        }
    }

    /// Wire a service from configuration: instance adjournment policy, the
    /// store's own ancestor query bounded by `hierarchy.max_depth`.
    pub fn from_config(
        store: Arc<dyn NamespaceStore>,
        config: &LifecycleConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let policy = Arc::new(InstanceAdjournmentPolicy::from_config(
            &config.adjourned_deletion,
        ));
        let resolver = Arc::new(StoreIndexedResolver::new(
            store.clone(),
            config.hierarchy.max_depth,
        ));
        Self::new(store, resolver, LifecycleEngine::new(policy, clock))
    }

    pub fn engine(&self) -> &LifecycleEngine {
        &self.engine
    }

    pub fn store(&self) -> &Arc<dyn NamespaceStore> {
        &self.store
    }

    /// Add a namespace to the store as-is.
    pub async fn register(&self, namespace: &Namespace) -> Result<(), StoreError> {
        self.store.insert(namespace).await
    }

    async fn load(&self, id: NamespaceId) -> Result<Namespace, TransitionError> {
        self.store
            .get(id)
            .await?
            .ok_or(TransitionError::NamespaceNotFound(id))
    }

    /// Apply one event to a stored namespace.
    pub async fn apply(
        &self,
        id: NamespaceId,
        event: LifecycleEvent,
        ctx: &TransitionContext,
    ) -> Result<NamespaceState, TransitionError> {
        let namespace = self.load(id).await?;

        let ancestors = match self.resolver.ancestors(&namespace).await {
            Ok(chain) => chain,
            Err(e) => return self.reject(&namespace, event, ctx, e.into()).await,
        };

        let plan = match self.engine.evaluate(&namespace, &ancestors, event, ctx) {
            Ok(plan) => plan,
            Err(e) => return self.reject(&namespace, event, ctx, e).await,
        };

        match self.store.commit_transition(&plan).await {
            Ok(()) => {
                self.engine.notify_success(&plan.record);
                Ok(plan.to)
            }
            Err(e) => self.reject(&namespace, event, ctx, e.into()).await,
        }
    }

    async fn reject(
        &self,
        namespace: &Namespace,
        event: LifecycleEvent,
        ctx: &TransitionContext,
        error: TransitionError,
    ) -> Result<NamespaceState, TransitionError> {
        let record = self.engine.failure_record(namespace, event, ctx, &error);
        if let Err(e) = self
            .store
            .record_rejection(namespace.lock_version, &record)
            .await
        {
            tracing::warn!(
                namespace_id = %namespace.id,
                event = %event,
                error = %e,
                "failed to record rejected transition"
            );
        }
        self.engine.notify_failure(&record, &error);
        Err(error)
    }

    pub async fn archive(
        &self,
        id: NamespaceId,
        ctx: &TransitionContext,
    ) -> Result<NamespaceState, TransitionError> {
        self.apply(id, LifecycleEvent::Archive, ctx).await
    }

    pub async fn unarchive(
        &self,
        id: NamespaceId,
        ctx: &TransitionContext,
    ) -> Result<NamespaceState, TransitionError> {
        self.apply(id, LifecycleEvent::Unarchive, ctx).await
    }

    pub async fn schedule_deletion(
        &self,
        id: NamespaceId,
        ctx: &TransitionContext,
    ) -> Result<NamespaceState, TransitionError> {
        self.apply(id, LifecycleEvent::ScheduleDeletion, ctx).await
    }

    pub async fn start_deletion(
        &self,
        id: NamespaceId,
        ctx: &TransitionContext,
    ) -> Result<NamespaceState, TransitionError> {
        self.apply(id, LifecycleEvent::StartDeletion, ctx).await
    }

    pub async fn reschedule_deletion(
        &self,
        id: NamespaceId,
        ctx: &TransitionContext,
    ) -> Result<NamespaceState, TransitionError> {
        self.apply(id, LifecycleEvent::RescheduleDeletion, ctx).await
    }

    pub async fn cancel_deletion(
        &self,
        id: NamespaceId,
        ctx: &TransitionContext,
    ) -> Result<NamespaceState, TransitionError> {
        self.apply(id, LifecycleEvent::CancelDeletion, ctx).await
    }

    /// Delete through the adjournment path when the policy allows it for
    /// this namespace, otherwise start deletion immediately.
    pub async fn request_deletion(
        &self,
        id: NamespaceId,
        ctx: &TransitionContext,
    ) -> Result<NamespaceState, TransitionError> {
        let namespace = self.load(id).await?;
        let event = if self.engine.policy().adjournment_enabled(&namespace) {
            LifecycleEvent::ScheduleDeletion
        } else {
            LifecycleEvent::StartDeletion
        };
        self.apply(id, event, ctx).await
    }

    pub async fn effective_pending_deletion(
        &self,
        id: NamespaceId,
    ) -> Result<Option<AncestorRef>, TransitionError> {
        let namespace = self.load(id).await?;
        let ancestors = self.resolver.ancestors(&namespace).await?;
        Ok(effective_pending_deletion(&namespace, &ancestors))
    }

    pub async fn effective_state(
        &self,
        id: NamespaceId,
    ) -> Result<NamespaceState, TransitionError> {
        let namespace = self.load(id).await?;
        let ancestors = self.resolver.ancestors(&namespace).await?;
        Ok(effective_state(&namespace, &ancestors))
    }

    pub async fn status(&self, id: NamespaceId) -> Result<NamespaceStatus, TransitionError> {
        let namespace = self.load(id).await?;
        let ancestors = self.resolver.ancestors(&namespace).await?;
        let grace = self.engine.policy().grace_period_days(&namespace);
        let permanent_deletion_date = namespace
            .deletion_schedule
            .as_ref()
            .map(|s| s.permanent_deletion_date(grace));
        Ok(NamespaceStatus {
            effective_state: effective_state(&namespace, &ancestors),
            pending_deletion: effective_pending_deletion(&namespace, &ancestors),
            permanent_deletion_date,
            namespace,
        })
    }

    pub async fn history(&self, id: NamespaceId) -> Result<Vec<TransitionRecord>, TransitionError> {
        Ok(self.store.transitions(id).await?)
    }

    /// Derive an explicit state from legacy flags for a namespace that still
    /// reads as `ancestor_inherited`. Returns whether anything was written.
    pub async fn backfill(
        &self,
        id: NamespaceId,
        flags: &LegacyFlags,
    ) -> Result<bool, TransitionError> {
        let mut namespace = self.load(id).await?;
        let expected = namespace.lock_version;
        let derived = backfill_state(flags, self.engine.clock().today());
        if !derived.apply_to(&mut namespace) {
            return Ok(false);
        }
        namespace.lock_version = expected + 1;
        self.store.commit(expected, &namespace, None).await?;
        tracing::info!(namespace_id = %id, state = %namespace.state, "backfilled namespace state");
        Ok(true)
    }
}
