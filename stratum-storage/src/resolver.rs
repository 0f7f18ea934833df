//! Object resolution for lazy links.
//!
//! [`Resolver`] decouples "how to fetch a missing value" from the links
//! that need it, so any id-addressable source can back a link.
//! [`DocumentResolver`] is the standard implementation: a memoized read
//! through the two-tier provider with a fixed one-week TTL.

use async_trait::async_trait;
use stratum_core::entity::Entity;
use stratum_core::{StratumResult, RESOLVER_TTL};

use crate::cache::CacheStore;
use crate::provider::TieredProvider;
use crate::store::DocumentStore;

/// Fetches documents by id on behalf of unresolved links.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Fetch the document `id` points at, or None when it does not exist.
    async fn resolve<T: Entity>(&self, id: &str) -> StratumResult<Option<T>>;
}

/// Resolver backed by the two-tier provider.
///
/// Resolution is a memoized read: try the cache, fall back to the document
/// store, and cache a hit for [`RESOLVER_TTL`]. Entries populated through
/// link resolution therefore expire after a week regardless of access
/// pattern, trading staleness risk for bounded cache growth.
#[derive(Debug)]
pub struct DocumentResolver<C, S> {
    provider: TieredProvider<C, S>,
}

impl<C, S> Clone for DocumentResolver<C, S> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
        }
    }
}

impl<C: CacheStore, S: DocumentStore> DocumentResolver<C, S> {
    /// Create a resolver over an existing provider.
    pub fn new(provider: TieredProvider<C, S>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<C: CacheStore, S: DocumentStore> Resolver for DocumentResolver<C, S> {
    async fn resolve<T: Entity>(&self, id: &str) -> StratumResult<Option<T>> {
        if id.is_empty() {
            return Ok(None);
        }
        let handles = self.provider.pool().handles()?;
        self.provider
            .get_or_create_with(
                id,
                || async move { handles.store().get_by_id::<T>(id).await },
                Some(RESOLVER_TTL),
            )
            .await
    }
}
