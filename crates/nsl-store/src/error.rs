//! Store error types.

use thiserror::Error;

use nsl_core::NamespaceId;
use nsl_state::{StateDecodeError, TransitionError};

/// Errors raised by [`NamespaceStore`](crate::NamespaceStore)
/// implementations and ancestor resolvers.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No namespace with this id.
    #[error("namespace {0} not found")]
    NotFound(NamespaceId),

    /// Insert of an id that is already present.
    #[error("namespace {0} already exists")]
    AlreadyExists(NamespaceId),

    /// Compare-and-set on `lock_version` lost.
    #[error("namespace {namespace_id} version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        /// The contested namespace.
        namespace_id: NamespaceId,
        /// Version the writer read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// A stored row could not be decoded.
    #[error("failed to decode namespace {namespace_id}: {detail}")]
    Decode {
        /// The offending row.
        namespace_id: NamespaceId,
        /// What was wrong with it.
        detail: String,
    },

    /// A stored state code is outside the enumeration.
    #[error(transparent)]
    State(#[from] StateDecodeError),

    /// The parent chain loops back on itself.
    #[error("namespace {0} has a cyclic ancestor chain")]
    HierarchyCycle(NamespaceId),

    /// The parent chain is deeper than the configured bound.
    #[error("namespace {namespace_id} has more than {max_depth} ancestors")]
    DepthExceeded {
        /// The namespace whose chain was walked.
        namespace_id: NamespaceId,
        /// Configured bound.
        max_depth: usize,
    },

    /// Postgres error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Snapshot (de)serialization or file I/O failure.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl From<StoreError> for TransitionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => TransitionError::NamespaceNotFound(id),
            StoreError::VersionConflict {
                namespace_id,
                expected,
                ..
            } => TransitionError::ConcurrentModification {
                namespace_id,
                expected_version: expected,
            },
            other => TransitionError::Persistence(other.to_string()),
        }
    }
}
