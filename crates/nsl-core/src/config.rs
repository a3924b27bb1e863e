//! # Instance Configuration
//!
//! Instance-wide settings consumed by the adjournment policy, the cutoff
//! scheduler, and the ancestor resolver. Loaded from YAML, then overlaid
//! with environment variables:
//!
//! | Variable | Field |
//! |---|---|
//! | `NSL_ADJOURNED_DELETION_ENABLED` | `adjourned_deletion.enabled` |
//! | `NSL_DELETION_GRACE_PERIOD_DAYS` | `adjourned_deletion.grace_period_days` |
//! | `NSL_SCHEDULER_BATCH_SIZE` | `scheduler.batch_size` |
//! | `NSL_SCHEDULER_CONCURRENCY` | `scheduler.concurrency` |
//! | `DATABASE_URL` | `database_url` |
//!
//! A grace period of zero or less is valid and disables adjournment; it is
//! a policy outcome, not a configuration error.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::NslError;

/// Upper bound on `grace_period_days`, about a century.
pub const MAX_GRACE_PERIOD_DAYS: i64 = 36_500;

/// Adjourned-deletion capability settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjournedDeletionConfig {
    /// Instance-wide switch for delayed deletion.
    pub enabled: bool,
    /// Days between `schedule_deletion` and eligibility for `start_deletion`.
    pub grace_period_days: i64,
}

impl Default for AdjournedDeletionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            grace_period_days: 30,
        }
    }
}

/// Cutoff scheduler batching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Namespaces fetched per scan page.
    pub batch_size: usize,
    /// Parallel `start_deletion` workers per page.
    pub concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            concurrency: 8,
        }
    }
}

/// Bounds on hierarchy traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Maximum number of ancestors walked before the chain is treated as
    /// corrupt (cyclic or unreasonably deep).
    pub max_depth: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self { max_depth: 20 }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub adjourned_deletion: AdjournedDeletionConfig,
    pub scheduler: SchedulerConfig,
    pub hierarchy: HierarchyConfig,
    /// Postgres connection string. `None` runs against the in-memory store.
    pub database_url: Option<String>,
}

impl LifecycleConfig {
    /// Parse a YAML document. Missing sections take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, NslError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, NslError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yaml::from_str(&raw)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for runs without a file.
    pub fn from_env() -> Result<Self, NslError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from a key lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), NslError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("NSL_ADJOURNED_DELETION_ENABLED") {
            self.adjourned_deletion.enabled = parse_bool("NSL_ADJOURNED_DELETION_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("NSL_DELETION_GRACE_PERIOD_DAYS") {
            self.adjourned_deletion.grace_period_days =
                parse_number("NSL_DELETION_GRACE_PERIOD_DAYS", &raw)?;
        }
        if let Some(raw) = lookup("NSL_SCHEDULER_BATCH_SIZE") {
            self.scheduler.batch_size = parse_number("NSL_SCHEDULER_BATCH_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("NSL_SCHEDULER_CONCURRENCY") {
            self.scheduler.concurrency = parse_number("NSL_SCHEDULER_CONCURRENCY", &raw)?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            if !url.trim().is_empty() {
                self.database_url = Some(url);
            }
        }
        Ok(())
    }

    /// Reject settings that would stall the scheduler or resolver.
    pub fn validate(&self) -> Result<(), NslError> {
        if self.scheduler.batch_size == 0 {
            return Err(NslError::InvalidConfig(
                "scheduler.batch_size must be greater than zero".to_string(),
            ));
        }
        if self.scheduler.concurrency == 0 {
            return Err(NslError::InvalidConfig(
                "scheduler.concurrency must be greater than zero".to_string(),
            ));
        }
        if self.hierarchy.max_depth == 0 {
            return Err(NslError::InvalidConfig(
                "hierarchy.max_depth must be greater than zero".to_string(),
            ));
        }
        if self.adjourned_deletion.grace_period_days > MAX_GRACE_PERIOD_DAYS {
            return Err(NslError::InvalidConfig(format!(
                "adjourned_deletion.grace_period_days must be at most {MAX_GRACE_PERIOD_DAYS}"
            )));
        }
        if self.adjourned_deletion.enabled && self.adjourned_deletion.grace_period_days <= 0 {
            tracing::warn!(
                grace_period_days = self.adjourned_deletion.grace_period_days,
                "adjourned deletion enabled with a non-positive grace period; deletions will be immediate"
            );
        }
        Ok(())
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, NslError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(NslError::InvalidConfig(format!(
            "{key}: expected a boolean, got {other:?}"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, NslError> {
    raw.trim()
        .parse()
        .map_err(|_| NslError::InvalidConfig(format!("{key}: expected a number, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LifecycleConfig::default();
        assert!(config.adjourned_deletion.enabled);
        assert_eq!(config.adjourned_deletion.grace_period_days, 30);
        assert_eq!(config.scheduler.batch_size, 100);
        assert_eq!(config.hierarchy.max_depth, 20);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = LifecycleConfig::from_yaml_str(
            "adjourned_deletion:\n  grace_period_days: 7\n",
        )
        .unwrap();
        assert!(config.adjourned_deletion.enabled);
        assert_eq!(config.adjourned_deletion.grace_period_days, 7);
        assert_eq!(config.scheduler.concurrency, 8);
    }

    #[test]
    fn test_env_overrides_win() {
        let mut config = LifecycleConfig::default();
        config
            .apply_overrides(lookup(&[
                ("NSL_ADJOURNED_DELETION_ENABLED", "false"),
                ("NSL_DELETION_GRACE_PERIOD_DAYS", "14"),
                ("DATABASE_URL", "postgres://localhost/nsl"),
            ]))
            .unwrap();
        assert!(!config.adjourned_deletion.enabled);
        assert_eq!(config.adjourned_deletion.grace_period_days, 14);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/nsl"));
    }

    #[test]
    fn test_bad_override_rejected() {
        let mut config = LifecycleConfig::default();
        let err = config
            .apply_overrides(lookup(&[("NSL_ADJOURNED_DELETION_ENABLED", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, NslError::InvalidConfig(_)));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = LifecycleConfig::from_yaml_str("scheduler:\n  batch_size: 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_non_positive_grace_period_is_valid() {
        let config = LifecycleConfig::from_yaml_str(
            "adjourned_deletion:\n  grace_period_days: 0\n",
        )
        .unwrap();
        assert_eq!(config.adjourned_deletion.grace_period_days, 0);
    }

    #[test]
    fn test_oversized_grace_period_rejected() {
        let result = LifecycleConfig::from_yaml_str(
            "adjourned_deletion:\n  grace_period_days: 9223372036854775807\n",
        );
        assert!(result.is_err());
        let at_bound = LifecycleConfig::from_yaml_str(&format!(
            "adjourned_deletion:\n  grace_period_days: {MAX_GRACE_PERIOD_DAYS}\n"
        ));
        assert!(at_bound.is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hierarchy:\n  max_depth: 5").unwrap();
        let config = LifecycleConfig::load(file.path()).unwrap();
        assert_eq!(config.hierarchy.max_depth, 5);
    }
}
