//! # nsl-core: Foundational Types for Namespace Lifecycle Management
//!
//! Leaf crate of the workspace. Defines the primitives every other crate
//! builds on: identifier newtypes, the acting identity attached to each
//! lifecycle event, UTC timestamps with an injectable [`Clock`], and the
//! instance-wide [`LifecycleConfig`].
//!
//! ## Crate Policy
//!
//! - No dependencies on other `nsl-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - Time is never read from ambient global state inside domain logic;
//!   callers pass a [`Clock`].

pub mod config;
pub mod error;
pub mod identity;
pub mod temporal;

pub use config::{
    AdjournedDeletionConfig, HierarchyConfig, LifecycleConfig, SchedulerConfig,
    MAX_GRACE_PERIOD_DAYS,
};
pub use error::NslError;
pub use identity::{Actor, CorrelationId, NamespaceId, UserId};
pub use temporal::{Clock, FixedClock, SystemClock, Timestamp};
