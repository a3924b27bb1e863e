//! # Deletion Cutoff Scheduler
//!
//! Moves namespaces whose grace period has elapsed from
//! `deletion_scheduled` to `deletion_in_progress`.
//!
//! A sweep pages through the store's due scan in id order and fires
//! `start_deletion` as the system actor on each namespace, with at most
//! `concurrency` transitions in flight. Namespaces moved by someone else
//! between the scan and the transition are counted as skipped or
//! conflicted, never as failures: re-running a sweep is always safe.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::Semaphore;

use nsl_core::{CorrelationId, NamespaceId, SchedulerConfig};
use nsl_state::{
    FailureClass, InstanceAdjournmentPolicy, NamespaceState, TransitionContext, TransitionError,
};

use crate::error::StoreError;
use crate::service::LifecycleService;

/// Counts for one batch or a whole sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub cutoff: Option<NaiveDate>,
    pub scanned: usize,
    /// Moved to `deletion_in_progress`.
    pub started: usize,
    /// No longer eligible when the transition ran.
    pub skipped: usize,
    /// Lost a compare-and-set race.
    pub conflicted: usize,
    pub failed: usize,
    /// Resume point for the next batch; `None` once the scan is exhausted.
    pub next_cursor: Option<NamespaceId>,
}

impl SweepReport {
    fn absorb(&mut self, batch: &SweepReport) {
        self.cutoff = batch.cutoff;
        self.scanned += batch.scanned;
        self.started += batch.started;
        self.skipped += batch.skipped;
        self.conflicted += batch.conflicted;
        self.failed += batch.failed;
        self.next_cursor = batch.next_cursor;
    }
}

enum Outcome {
    Started,
    Skipped,
    Conflicted,
    Failed,
}

fn classify(result: &Result<NamespaceState, TransitionError>) -> Outcome {
    match result {
        Ok(_) => Outcome::Started,
        Err(e) => match e.class() {
            FailureClass::NotAllowed => Outcome::Skipped,
            FailureClass::Retry => Outcome::Conflicted,
            FailureClass::Hard => Outcome::Failed,
        },
    }
}

#[derive(Debug, Clone)]
pub struct CutoffScheduler {
    service: Arc<LifecycleService>,
    policy: InstanceAdjournmentPolicy,
    config: SchedulerConfig,
}

impl CutoffScheduler {
    pub fn new(
        service: Arc<LifecycleService>,
        policy: InstanceAdjournmentPolicy,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            service,
            policy,
            config,
        }
    }

    /// Latest `marked_for_deletion_on` that is due as of the service clock.
    pub fn cutoff(&self) -> NaiveDate {
        self.policy
            .deletion_cutoff(self.service.engine().clock().today())
    }

    /// Process one page of due namespaces with ids greater than `after`.
    pub async fn run_batch(&self, after: Option<NamespaceId>) -> Result<SweepReport, StoreError> {
        let cutoff = self.cutoff();
        let batch_size = self.config.batch_size.max(1);
        let concurrency = self.config.concurrency.max(1);
        let due = self
            .service
            .store()
            .scan_deletion_due(cutoff, after, batch_size)
            .await?;

        let mut report = SweepReport {
            cutoff: Some(cutoff),
            scanned: due.len(),
            next_cursor: (due.len() == batch_size)
                .then(|| due.last().map(|ns| ns.id))
                .flatten(),
            ..SweepReport::default()
        };

        let ctx = TransitionContext::system().with_correlation_id(CorrelationId::generate());
        let permits = Arc::new(Semaphore::new(concurrency));
        let mut handles = Vec::with_capacity(report.scanned);
        for namespace in due {
            let permit = match permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!(
                        namespace_id = %namespace.id,
                        error = %e,
                        "worker permits closed"
                    );
                    report.failed += 1;
                    continue;
                }
            };
            let service = self.service.clone();
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let result = service.start_deletion(namespace.id, &ctx).await;
                tracing::debug!(
                    namespace_id = %namespace.id,
                    ok = result.is_ok(),
                    "cutoff start_deletion"
                );
                classify(&result)
            }));
        }
        for handle in handles {
            tally(&mut report, handle.await);
        }

        tracing::info!(
            cutoff = %cutoff,
            correlation_id = %ctx.correlation_id,
            scanned = report.scanned,
            started = report.started,
            skipped = report.skipped,
            conflicted = report.conflicted,
            failed = report.failed,
            "deletion cutoff batch processed"
        );
        Ok(report)
    }

    /// Page through every due namespace, resuming from `after`.
    pub async fn run_to_completion(
        &self,
        after: Option<NamespaceId>,
    ) -> Result<SweepReport, StoreError> {
        let mut total = SweepReport::default();
        let mut cursor = after;
        loop {
            let batch = self.run_batch(cursor).await?;
            total.absorb(&batch);
            match batch.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(total)
    }
}

fn tally(report: &mut SweepReport, joined: Result<Outcome, tokio::task::JoinError>) {
    match joined {
        Ok(Outcome::Started) => report.started += 1,
        Ok(Outcome::Skipped) => report.skipped += 1,
        Ok(Outcome::Conflicted) => report.conflicted += 1,
        Ok(Outcome::Failed) => report.failed += 1,
        Err(e) => {
            tracing::error!(error = %e, "cutoff worker task failed");
            report.failed += 1;
        }
    }
}
