//! # Identity Newtypes
//!
//! Newtype wrappers for the identifiers that flow through lifecycle
//! transitions. A `UserId` cannot be passed where a `NamespaceId` is
//! expected, even though both are 64-bit integers in storage.
//!
//! `NamespaceId` is totally ordered: the cutoff scheduler pages through
//! namespaces in ascending id order and resumes from the last processed id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a namespace (group, project, or personal namespace).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceId(pub i64);

/// Unique identifier for a user acting on a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Correlation identifier tying a transition to the request or job that
/// triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(pub String);

impl NamespaceId {
    /// The raw database identifier.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl UserId {
    /// The raw database identifier.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl CorrelationId {
    /// Generate a fresh random correlation identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap a caller-supplied correlation identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::generate()
    }
}

impl From<i64> for NamespaceId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Actor ───────────────────────────────────────────────────────────

/// The identity on whose behalf a lifecycle event is raised.
///
/// Interactive requests act as a user. Cutoff scheduling and other
/// background jobs act as the system and carry no user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "user_id", rename_all = "snake_case")]
pub enum Actor {
    /// A human or API user.
    User(UserId),
    /// A system-triggered transition (scheduler, migration, executor).
    System,
}

impl Actor {
    /// The user id behind this actor, if any.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::System => None,
        }
    }

    /// Build an actor from an optional user id, as stored in a row.
    pub fn from_user_id(id: Option<i64>) -> Self {
        match id {
            Some(id) => Self::User(UserId(id)),
            None => Self::System,
        }
    }
}

impl From<UserId> for Actor {
    fn from(id: UserId) -> Self {
        Self::User(id)
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::System => f.write_str("system"),
        }
    }
}
