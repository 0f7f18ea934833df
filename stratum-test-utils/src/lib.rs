//! Stratum Test Utilities
//!
//! Centralized test infrastructure for the Stratum workspace:
//! - A small sample domain (users, tournaments, sports) with cross-document
//!   links, used by integration and property tests
//! - Proptest generators for the sample entities
//! - Fixtures wiring up in-memory pools, providers, and resolvers

// Re-export core types for convenience
pub use stratum_core::{
    build_key, build_key_for, generate_entity_id, strip_key_prefixes, CacheError, DocumentMeta,
    Entity, Identified, SoftDeletable, StoreError, StratumError, StratumResult, Timestamp,
    Timestamped, Typed, RESOLVER_TTL,
};

// Re-export the storage stack for convenience
pub use stratum_storage::{
    CacheStats, CacheStore, ConnectionPool, DocumentResolver, DocumentStore, InMemoryCacheStore,
    InMemoryDocumentStore, LinkState, ObjectLink, ProviderConfig, Resolver, TieredProvider,
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use stratum_core::impl_document_meta;

// ============================================================================
// SAMPLE DOMAIN
// ============================================================================

/// A sport that tournaments are played in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sport {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub name: String,
}

impl_document_meta!(Sport);

impl Typed for Sport {
    const TYPE_TAG: &'static str = "sport";
}

impl Sport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: DocumentMeta::new(),
            name: name.into(),
        }
    }
}

/// A registered user. Completed tournaments are linked, not embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default)]
    pub completed_tournaments: Vec<ObjectLink<Tournament>>,
}

impl_document_meta!(User);

impl Typed for User {
    const TYPE_TAG: &'static str = "user";
}

impl User {
    /// New user with the id left for the store to assign.
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            meta: DocumentMeta::new(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            age: None,
            completed_tournaments: Vec::new(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A tournament linking its owner, sport, and participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    #[serde(flatten)]
    pub meta: DocumentMeta,
    pub name: String,
    pub starts: Timestamp,
    #[serde(default)]
    pub owner: ObjectLink<User>,
    #[serde(default)]
    pub sport: ObjectLink<Sport>,
    #[serde(default)]
    pub users: Vec<ObjectLink<User>>,
}

impl_document_meta!(Tournament);

impl Typed for Tournament {
    const TYPE_TAG: &'static str = "tournament";
}

impl Tournament {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: DocumentMeta::new(),
            name: name.into(),
            starts: Utc::now(),
            owner: ObjectLink::default(),
            sport: ObjectLink::default(),
            users: Vec::new(),
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for the sample domain.

    use super::*;
    use proptest::prelude::*;

    /// Generate an id in the same shape the id generator produces.
    pub fn arb_entity_id() -> impl Strategy<Value = String> {
        "[a-f0-9]{32}"
    }

    /// Generate a human-looking name fragment.
    pub fn arb_name() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{2,11}"
    }

    /// Generate a sport with a pre-assigned id.
    pub fn arb_sport() -> impl Strategy<Value = Sport> {
        (arb_entity_id(), arb_name()).prop_map(|(id, name)| Sport {
            meta: DocumentMeta::with_id(id),
            name,
        })
    }

    /// Generate a user with a pre-assigned id and no links.
    pub fn arb_user() -> impl Strategy<Value = User> {
        (
            arb_entity_id(),
            arb_name(),
            arb_name(),
            proptest::option::of(18u32..90),
        )
            .prop_map(|(id, first_name, last_name, age)| User {
                meta: DocumentMeta::with_id(id),
                first_name,
                last_name,
                age,
                completed_tournaments: Vec::new(),
            })
    }

    /// Generate a tournament linked to the given owner and sport ids.
    pub fn arb_tournament(owner_id: String, sport_id: String) -> impl Strategy<Value = Tournament> {
        (arb_entity_id(), arb_name()).prop_map(move |(id, name)| Tournament {
            meta: DocumentMeta::with_id(id),
            name,
            starts: Utc::now(),
            owner: ObjectLink::from_id(owner_id.clone()),
            sport: ObjectLink::from_id(sport_id.clone()),
            users: Vec::new(),
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;
    use std::sync::Arc;

    /// A connected pool over in-memory backends.
    pub fn memory_pool() -> Arc<ConnectionPool<InMemoryCacheStore, InMemoryDocumentStore>> {
        Arc::new(ConnectionPool::connect(
            InMemoryCacheStore::new(),
            InMemoryDocumentStore::new(),
        ))
    }

    /// A provider over a fresh in-memory pool.
    pub fn memory_provider() -> TieredProvider<InMemoryCacheStore, InMemoryDocumentStore> {
        TieredProvider::new(memory_pool())
    }

    /// A resolver over a fresh in-memory pool.
    pub fn memory_resolver() -> DocumentResolver<InMemoryCacheStore, InMemoryDocumentStore> {
        DocumentResolver::new(memory_provider())
    }

    /// A user with a known name and no id, as callers hand entities in.
    pub fn sample_user() -> User {
        User::new("John", "Appleseed")
    }

    /// A tournament owned by `owner`, played in `sport`.
    pub fn sample_tournament(owner: &User, sport: &Sport) -> Tournament {
        let mut tournament = Tournament::new("Spring Open");
        tournament.owner = ObjectLink::from_id(owner.id());
        tournament.sport = ObjectLink::from_id(sport.id());
        tournament
    }
}
