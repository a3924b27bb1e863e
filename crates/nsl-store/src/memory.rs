//! In-memory storage backend using DashMap.
//!
//! Namespaces live in a `DashMap<NamespaceId, Namespace>`. The compare-and-set
//! in [`commit`](NamespaceStore::commit) runs while holding the entry's shard
//! lock, and the audit append happens under that same lock, so a reader never
//! sees a committed state without its record.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use nsl_core::NamespaceId;
use nsl_state::{note_rejection, Namespace, NamespaceState, TransitionRecord};

use crate::error::StoreError;
use crate::store::NamespaceStore;

/// Serializable image of an [`InMemoryStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub namespaces: Vec<Namespace>,
    #[serde(default)]
    pub transitions: Vec<TransitionRecord>,
}

#[derive(Debug, Default)]
struct Inner {
    namespaces: DashMap<NamespaceId, Namespace>,
    transitions: Mutex<Vec<TransitionRecord>>,
}

/// Process-local namespace store.
///
/// Cheaply cloneable via `Arc`; all clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        for ns in snapshot.namespaces {
            store.inner.namespaces.insert(ns.id, ns);
        }
        *store.inner.transitions.lock() = snapshot.transitions;
        store
    }

    /// Namespaces in id order plus the full audit trail.
    pub fn snapshot(&self) -> Snapshot {
        let mut namespaces: Vec<Namespace> = self
            .inner
            .namespaces
            .iter()
            .map(|e| e.value().clone())
            .collect();
        namespaces.sort_by_key(|ns| ns.id);
        Snapshot {
            namespaces,
            transitions: self.inner.transitions.lock().clone(),
        }
    }

    /// Load a JSON snapshot file. A missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Snapshot(format!("read {}: {e}", path.display())))?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Snapshot(format!("parse {}: {e}", path.display())))?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the current contents as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| StoreError::Snapshot(format!("serialize: {e}")))?;
        std::fs::write(path, json)
            .map_err(|e| StoreError::Snapshot(format!("write {}: {e}", path.display())))
    }

    pub fn len(&self) -> usize {
        self.inner.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.namespaces.is_empty()
    }
}

#[async_trait]
impl NamespaceStore for InMemoryStore {
    async fn get(&self, id: NamespaceId) -> Result<Option<Namespace>, StoreError> {
        Ok(self.inner.namespaces.get(&id).map(|e| e.value().clone()))
    }

    async fn insert(&self, namespace: &Namespace) -> Result<(), StoreError> {
        use dashmap::mapref::entry::Entry;
        match self.inner.namespaces.entry(namespace.id) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(namespace.id)),
            Entry::Vacant(slot) => {
                slot.insert(namespace.clone());
                Ok(())
            }
        }
    }

    async fn commit(
        &self,
        expected_version: u64,
        namespace: &Namespace,
        record: Option<&TransitionRecord>,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .inner
            .namespaces
            .get_mut(&namespace.id)
            .ok_or(StoreError::NotFound(namespace.id))?;
        if entry.lock_version != expected_version {
            return Err(StoreError::VersionConflict {
                namespace_id: namespace.id,
                expected: expected_version,
                actual: entry.lock_version,
            });
        }
        *entry = namespace.clone();
        if let Some(record) = record {
            self.inner.transitions.lock().push(record.clone());
        }
        Ok(())
    }

    async fn record_rejection(
        &self,
        expected_version: u64,
        record: &TransitionRecord,
    ) -> Result<bool, StoreError> {
        let mut entry = self
            .inner
            .namespaces
            .get_mut(&record.namespace_id)
            .ok_or(StoreError::NotFound(record.namespace_id))?;
        let current = entry.lock_version == expected_version;
        if current {
            note_rejection(&mut entry, record);
        }
        self.inner.transitions.lock().push(record.clone());
        Ok(current)
    }

    async fn scan_deletion_due(
        &self,
        cutoff: NaiveDate,
        after: Option<NamespaceId>,
        limit: usize,
    ) -> Result<Vec<Namespace>, StoreError> {
        let mut due: Vec<Namespace> = self
            .inner
            .namespaces
            .iter()
            .filter(|e| {
                let ns = e.value();
                ns.state == NamespaceState::DeletionScheduled
                    && after.map_or(true, |a| ns.id > a)
                    && ns
                        .deletion_schedule
                        .as_ref()
                        .is_some_and(|s| s.is_due(cutoff))
            })
            .map(|e| e.value().clone())
            .collect();
        due.sort_by_key(|ns| ns.id);
        due.truncate(limit);
        Ok(due)
    }

    async fn transitions(&self, id: NamespaceId) -> Result<Vec<TransitionRecord>, StoreError> {
        Ok(self
            .inner
            .transitions
            .lock()
            .iter()
            .filter(|r| r.namespace_id == id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsl_core::{Actor, CorrelationId, Timestamp};
    use nsl_state::{DeletionSchedule, LifecycleEvent, NamespaceKind, TransitionError};

    fn group(id: i64, parent: Option<i64>) -> Namespace {
        Namespace::new(
            NamespaceId(id),
            parent.map(NamespaceId),
            NamespaceKind::Group,
            Timestamp::now(),
        )
    }

    fn scheduled(id: i64, on: NaiveDate) -> Namespace {
        let mut ns = group(id, None);
        ns.state = NamespaceState::DeletionScheduled;
        ns.deletion_schedule = Some(DeletionSchedule {
            marked_for_deletion_on: on,
            scheduled_by: Actor::System,
            scheduled_at: Timestamp::start_of_day(on),
        });
        ns
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let store = InMemoryStore::new();
        store.insert(&group(1, None)).await.unwrap();
        assert!(matches!(
            store.insert(&group(1, None)).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_commit_is_compare_and_set() {
        let store = InMemoryStore::new();
        store.insert(&group(1, None)).await.unwrap();

        let mut next = group(1, None);
        next.state = NamespaceState::Archived;
        next.lock_version = 1;
        store.commit(0, &next, None).await.unwrap();

        let err = store.commit(0, &next, None).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { expected: 0, actual: 1, .. }));
        assert_eq!(
            store.get(NamespaceId(1)).await.unwrap().unwrap().state,
            NamespaceState::Archived
        );
    }

    #[tokio::test]
    async fn test_rejection_keeps_version() {
        let store = InMemoryStore::new();
        store.insert(&group(1, None)).await.unwrap();
        let error = TransitionError::InvalidTransition {
            from: NamespaceState::AncestorInherited,
            event: LifecycleEvent::ScheduleDeletion,
        };
        let record = TransitionRecord::failure(
            NamespaceId(1),
            LifecycleEvent::ScheduleDeletion,
            NamespaceState::AncestorInherited,
            Actor::System,
            CorrelationId::new("r"),
            Timestamp::now(),
            &error,
        );
        assert!(store.record_rejection(0, &record).await.unwrap());

        let ns = store.get(NamespaceId(1)).await.unwrap().unwrap();
        assert_eq!(ns.lock_version, 0);
        assert!(ns.metadata.last_error.is_some());
        assert_eq!(store.transitions(NamespaceId(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_rejection_leaves_metadata() {
        let store = InMemoryStore::new();
        store.insert(&group(1, None)).await.unwrap();
        let mut next = group(1, None);
        next.state = NamespaceState::Archived;
        next.lock_version = 1;
        store.commit(0, &next, None).await.unwrap();

        let error = TransitionError::InvalidTransition {
            from: NamespaceState::AncestorInherited,
            event: LifecycleEvent::Unarchive,
        };
        let record = TransitionRecord::failure(
            NamespaceId(1),
            LifecycleEvent::Unarchive,
            NamespaceState::AncestorInherited,
            Actor::from_user_id(Some(99)),
            CorrelationId::new("stale"),
            Timestamp::now(),
            &error,
        );
        assert!(!store.record_rejection(0, &record).await.unwrap());

        let ns = store.get(NamespaceId(1)).await.unwrap().unwrap();
        assert_eq!(ns, next);
        assert_eq!(store.transitions(NamespaceId(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_scan_orders_by_id_and_resumes() {
        let store = InMemoryStore::new();
        for (id, d) in [(5, 1), (2, 3), (9, 2), (7, 20)] {
            store.insert(&scheduled(id, day(d))).await.unwrap();
        }
        store.insert(&group(3, None)).await.unwrap();

        let first = store.scan_deletion_due(day(10), None, 2).await.unwrap();
        let ids: Vec<i64> = first.iter().map(|n| n.id.get()).collect();
        assert_eq!(ids, vec![2, 5]);

        let rest = store.scan_deletion_due(day(10), Some(NamespaceId(5)), 2).await.unwrap();
        let ids: Vec<i64> = rest.iter().map(|n| n.id.get()).collect();
        assert_eq!(ids, vec![9]);
    }

    #[tokio::test]
    async fn test_parent_walk_detects_cycles() {
        let store = InMemoryStore::new();
        store.insert(&group(1, Some(3))).await.unwrap();
        store.insert(&group(2, Some(1))).await.unwrap();
        store.insert(&group(3, Some(2))).await.unwrap();
        let ns = store.get(NamespaceId(3)).await.unwrap().unwrap();
        assert!(matches!(
            store.ancestor_chain(&ns, 20).await,
            Err(StoreError::HierarchyCycle(_))
        ));
    }

    #[tokio::test]
    async fn test_parent_walk_depth_bound() {
        let store = InMemoryStore::new();
        store.insert(&group(1, None)).await.unwrap();
        for id in 2..=6 {
            store.insert(&group(id, Some(id - 1))).await.unwrap();
        }
        let leaf = store.get(NamespaceId(6)).await.unwrap().unwrap();
        assert_eq!(store.ancestor_chain(&leaf, 5).await.unwrap().len(), 5);
        assert!(matches!(
            store.ancestor_chain(&leaf, 4).await,
            Err(StoreError::DepthExceeded { max_depth: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_snapshot_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        assert!(InMemoryStore::load(&path).unwrap().is_empty());

        let store = InMemoryStore::new();
        store.insert(&scheduled(4, day(1))).await.unwrap();
        store.save(&path).unwrap();

        let loaded = InMemoryStore::load(&path).unwrap();
        assert_eq!(loaded.snapshot(), store.snapshot());
    }
}
