//! Stratum Storage - Two-Tier Persistence
//!
//! This crate implements the two-tier storage stack:
//! - **Cache tier**: volatile key-value store with TTL expiry and sorted
//!   sets for capped lists ([`cache`])
//! - **Document tier**: durable document store addressed by id ([`store`])
//! - **Connection pool**: explicit lifecycle around one backend pair
//!   ([`pool`])
//! - **Tiered provider**: write-through writes and memoized reads across
//!   both tiers ([`provider`])
//! - **Lazy links**: cross-document references resolved on first access
//!   ([`link`], [`resolver`])
//!
//! The store is the ordering authority. Writes land there first; the cache
//! is a best-effort mirror that reads repopulate through the memoized path.

pub mod cache;
pub mod link;
pub mod pool;
pub mod provider;
pub mod resolver;
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use cache::{CacheStats, CacheStore, InMemoryCacheStore};
pub use link::{LinkState, ObjectLink};
pub use pool::{ConnectionPool, Handles};
pub use provider::{ProviderConfig, TieredProvider};
pub use resolver::{DocumentResolver, Resolver};
pub use store::{
    DocumentEnvelope, DocumentStore, InMemoryDocumentStore, LmdbDocumentStore, LmdbStoreConfig,
    LmdbStoreError,
};
