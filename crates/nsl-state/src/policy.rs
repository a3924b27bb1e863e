//! # Deletion Adjournment Policy
//!
//! Decides whether a deletion request is deferred behind a grace period or
//! carried out immediately. The engine receives the policy at construction.

use std::fmt::Debug;

use chrono::NaiveDate;

use nsl_core::{AdjournedDeletionConfig, MAX_GRACE_PERIOD_DAYS};

use crate::namespace::Namespace;

/// Per-namespace adjournment decisions.
pub trait AdjournmentPolicy: Send + Sync + Debug {
    /// Days a scheduled deletion waits before it may start.
    fn grace_period_days(&self, namespace: &Namespace) -> i64;

    /// Whether deletion of this namespace goes through
    /// `deletion_scheduled`. False for personal namespaces, when the
    /// instance capability is off, or when the grace period is not positive.
    fn adjournment_enabled(&self, namespace: &Namespace) -> bool;
}

/// Policy driven by instance configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceAdjournmentPolicy {
    enabled: bool,
    grace_period_days: i64,
}

impl InstanceAdjournmentPolicy {
    pub fn new(enabled: bool, grace_period_days: i64) -> Self {
        Self {
            enabled,
            grace_period_days,
        }
    }

    pub fn from_config(config: &AdjournedDeletionConfig) -> Self {
        Self::new(config.enabled, config.grace_period_days)
    }

    /// Latest `marked_for_deletion_on` whose grace period has elapsed by
    /// `today`. Grace periods are clamped to `0..=MAX_GRACE_PERIOD_DAYS`.
    pub fn deletion_cutoff(&self, today: NaiveDate) -> NaiveDate {
        let days = self.grace_period_days.clamp(0, MAX_GRACE_PERIOD_DAYS);
        today
            .checked_sub_signed(chrono::Duration::days(days))
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn instance_grace_period_days(&self) -> i64 {
        self.grace_period_days
    }
}

impl Default for InstanceAdjournmentPolicy {
    fn default() -> Self {
        Self::from_config(&AdjournedDeletionConfig::default())
    }
}

impl AdjournmentPolicy for InstanceAdjournmentPolicy {
    fn grace_period_days(&self, _namespace: &Namespace) -> i64 {
        self.grace_period_days
    }

    fn adjournment_enabled(&self, namespace: &Namespace) -> bool {
        self.enabled && !namespace.is_personal() && self.grace_period_days > 0
    }
}
