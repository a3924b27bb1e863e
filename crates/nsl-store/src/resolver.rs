//! Ancestor resolution.
//!
//! Guards only see the ancestor chain handed to them. How that chain is
//! produced is a deployment choice: a parent walk over any store, or the
//! store's own hierarchy query.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use nsl_state::{AncestorChain, Namespace};

use crate::error::StoreError;
use crate::store::{walk_parents, NamespaceStore};

#[async_trait]
pub trait AncestorResolver: Send + Sync + Debug {
    /// Ancestors of `namespace`, nearest first.
    async fn ancestors(&self, namespace: &Namespace) -> Result<AncestorChain, StoreError>;
}

/// Follows `parent_id` links with one lookup per hop.
#[derive(Debug, Clone)]
pub struct ParentWalkResolver {
    store: Arc<dyn NamespaceStore>,
    max_depth: usize,
}

impl ParentWalkResolver {
    pub fn new(store: Arc<dyn NamespaceStore>, max_depth: usize) -> Self {
        Self { store, max_depth }
    }
}

#[async_trait]
impl AncestorResolver for ParentWalkResolver {
    async fn ancestors(&self, namespace: &Namespace) -> Result<AncestorChain, StoreError> {
        walk_parents(self.store.as_ref(), namespace, self.max_depth).await
    }
}

/// Delegates to [`NamespaceStore::ancestor_chain`], which a store may back
/// with a single hierarchy query.
#[derive(Debug, Clone)]
pub struct StoreIndexedResolver {
    store: Arc<dyn NamespaceStore>,
    max_depth: usize,
}

impl StoreIndexedResolver {
    pub fn new(store: Arc<dyn NamespaceStore>, max_depth: usize) -> Self {
        Self { store, max_depth }
    }
}

#[async_trait]
impl AncestorResolver for StoreIndexedResolver {
    async fn ancestors(&self, namespace: &Namespace) -> Result<AncestorChain, StoreError> {
        self.store.ancestor_chain(namespace, self.max_depth).await
    }
}
