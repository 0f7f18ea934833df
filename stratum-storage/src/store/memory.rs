//! In-memory document store.
//!
//! Reference [`DocumentStore`] backend over a process-local hash map, for
//! tests and ephemeral deployments. Interior locks are synchronous; no guard
//! is ever held across an await point.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use stratum_core::entity::{Entity, Typed};
use stratum_core::{StoreError, StratumResult};

use crate::store::{ensure_id, DocumentEnvelope, DocumentStore};

/// Process-local document store.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<String, DocumentEnvelope>>,
    collections: RwLock<HashSet<String>>,
}

impl InMemoryDocumentStore {
    /// Create an empty document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently stored, across all types.
    pub fn len(&self) -> usize {
        self.documents.read().map(|docs| docs.len()).unwrap_or(0)
    }

    /// Whether the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn upsert<T: Entity>(&self, value: &mut T) -> StratumResult<String> {
        let id = ensure_id(value);
        let envelope = DocumentEnvelope::wrap(value).map_err(|e| StoreError::Serialization {
            id: id.clone(),
            reason: e.to_string(),
        })?;

        let mut documents = self.documents.write().map_err(|_| StoreError::LockPoisoned)?;
        documents.insert(id.clone(), envelope);
        Ok(id)
    }

    async fn get_by_id<T: Entity>(&self, id: &str) -> StratumResult<Option<T>> {
        let documents = self.documents.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(documents
            .get(id)
            .cloned()
            .and_then(DocumentEnvelope::into_document))
    }

    async fn delete(&self, id: &str) -> StratumResult<()> {
        let mut documents = self.documents.write().map_err(|_| StoreError::LockPoisoned)?;
        documents.remove(id);
        Ok(())
    }

    async fn query<T, P>(&self, predicate: P) -> StratumResult<Vec<T>>
    where
        T: Entity,
        P: Fn(&T) -> bool + Send,
    {
        let documents = self.documents.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(documents
            .values()
            .filter(|envelope| envelope.doc_type == T::TYPE_TAG)
            .cloned()
            .filter_map(DocumentEnvelope::into_document)
            .filter(|value| predicate(value))
            .collect())
    }

    async fn ensure_collection(&self, name: &str) -> StratumResult<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;
        collections.insert(name.to_string());
        Ok(())
    }

    async fn purge_all(&self) -> StratumResult<()> {
        let mut documents = self.documents.write().map_err(|_| StoreError::LockPoisoned)?;
        documents.clear();
        Ok(())
    }

    async fn health_check(&self) -> StratumResult<()> {
        self.documents.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(())
    }
}
