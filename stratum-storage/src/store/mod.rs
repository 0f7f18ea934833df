//! Durable document tier.
//!
//! Documents are stored as [`DocumentEnvelope`] records: the entity body as
//! JSON plus the type tag it was written under. Typed reads check the tag,
//! so two entity types can never shadow each other even if their ids collide.
//!
//! - `traits` lives here: the [`DocumentStore`] backend abstraction
//! - `memory`: process-local reference backend
//! - `lmdb`: persistent backend over a memory-mapped LMDB environment

pub mod lmdb;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stratum_core::entity::{Entity, Identified, Typed};
use stratum_core::{generate_entity_id, StratumResult};

pub use lmdb::{LmdbDocumentStore, LmdbStoreConfig, LmdbStoreError};
pub use memory::InMemoryDocumentStore;

// ============================================================================
// Document Envelope
// ============================================================================

/// Storage record for a single document.
///
/// Backends persist envelopes rather than raw entity bodies so the type tag
/// travels with the document and reads can filter by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEnvelope {
    /// Primary identifier, unique across the store.
    pub id: String,
    /// Type tag of the entity this envelope was written under.
    pub doc_type: String,
    /// Entity body as JSON.
    pub body: serde_json::Value,
}

impl DocumentEnvelope {
    /// Wrap an entity for storage. The entity must already carry its id.
    pub fn wrap<T: Entity>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: value.id().to_string(),
            doc_type: T::TYPE_TAG.to_string(),
            body: serde_json::to_value(value)?,
        })
    }

    /// Unwrap into a typed entity.
    ///
    /// Returns None when the envelope was written under a different type tag,
    /// or when the body no longer deserializes as `T` (logged, treated as
    /// absent rather than failing the read).
    pub fn into_document<T: Entity>(self) -> Option<T> {
        if self.doc_type != T::TYPE_TAG {
            return None;
        }
        match serde_json::from_value::<T>(self.body) {
            Ok(mut value) => {
                if value.id().is_empty() {
                    value.set_id(self.id);
                }
                Some(value)
            }
            Err(e) => {
                tracing::warn!(
                    id = %self.id,
                    doc_type = %self.doc_type,
                    error = %e,
                    "Stored document body failed to deserialize, treating as absent"
                );
                None
            }
        }
    }
}

/// Assign a generated id to an entity that does not carry one yet.
///
/// Returns the id the entity holds afterwards. Backends call this before
/// serializing so the generated id lands inside the stored body.
pub(crate) fn ensure_id<T: Entity>(value: &mut T) -> String {
    if value.id().is_empty() {
        value.set_id(generate_entity_id());
    }
    value.id().to_string()
}

// ============================================================================
// Document Store Trait
// ============================================================================

/// Durable backend trait for pluggable document stores.
///
/// Identifiers are caller-controlled strings. Writes replace the whole
/// document; there are no partial updates. Deleting an absent id succeeds,
/// and reads of absent ids return None rather than an error.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace a document. Assigns a generated id first when the
    /// entity does not carry one, writing it back through the reference.
    /// Returns the id the document was stored under.
    async fn upsert<T: Entity>(&self, value: &mut T) -> StratumResult<String>;

    /// Fetch a document by id, or None when absent or stored under a
    /// different type tag.
    async fn get_by_id<T: Entity>(&self, id: &str) -> StratumResult<Option<T>>;

    /// Remove a document by id. Removing an absent id is not an error.
    async fn delete(&self, id: &str) -> StratumResult<()>;

    /// All documents of type `T` matching the predicate. Full scan; intended
    /// for admin paths and tests, not hot paths.
    async fn query<T, P>(&self, predicate: P) -> StratumResult<Vec<T>>
    where
        T: Entity,
        P: Fn(&T) -> bool + Send;

    /// Ensure the named collection exists. Idempotent.
    async fn ensure_collection(&self, name: &str) -> StratumResult<()>;

    /// Remove every document. Intended for tests and tooling.
    async fn purge_all(&self) -> StratumResult<()>;

    /// Verify the backend is reachable and writable.
    async fn health_check(&self) -> StratumResult<()>;
}
