//! Two-tier storage provider.
//!
//! [`TieredProvider`] mediates every read and write between the volatile
//! cache and the durable document store. The invariant it maintains: cache
//! entries, when present, reflect the latest successfully written store
//! state, modulo best-effort write-through failures.
//!
//! Write ordering is store first, cache second. The store is the ordering
//! authority: the cache must never hold a value the store rejected, so a
//! failed store write aborts the call before the cache is touched, while a
//! failed cache mirror after a successful store write is logged and
//! swallowed (the record is durable; reads fall back to the store).
//!
//! There is no single-flight deduplication: concurrent [`get_or_create`]
//! misses on one key each invoke their factory and each write the cache,
//! last writer wins. Factories are expected to be idempotent reads.
//!
//! [`get_or_create`]: TieredProvider::get_or_create

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use stratum_core::entity::{Entity, Identified, Typed};
use stratum_core::key::{build_key_for, strip_key_prefixes};
use stratum_core::{generate_entity_id, CacheError, StratumError, StratumResult};

use crate::cache::{CacheStats, CacheStore};
use crate::pool::ConnectionPool;
use crate::store::DocumentStore;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the two-tier provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// TTL applied to cache writes when the operation does not pass one.
    /// None means entries written without an explicit TTL never expire.
    pub default_ttl: Option<Duration>,
}

impl ProviderConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset:
    /// - `STRATUM_CACHE_DEFAULT_TTL_SECS`: default TTL in seconds
    pub fn from_env() -> Self {
        Self {
            default_ttl: std::env::var("STRATUM_CACHE_DEFAULT_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs),
        }
    }

    /// Set the default TTL for cache writes.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }
}

// ============================================================================
// Tiered Provider
// ============================================================================

/// Mediates reads and writes across the cache and document tiers.
///
/// Cheap to clone; clones share the same pool and configuration.
#[derive(Debug)]
pub struct TieredProvider<C, S> {
    pool: Arc<ConnectionPool<C, S>>,
    config: ProviderConfig,
}

impl<C, S> Clone for TieredProvider<C, S> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            config: self.config.clone(),
        }
    }
}

fn require_non_empty(value: &str, what: &str) -> StratumResult<()> {
    if value.is_empty() {
        return Err(StratumError::InvalidArgument {
            reason: format!("{what} must not be empty"),
        });
    }
    Ok(())
}

/// Pick the logical key for [`TieredProvider::set_object`]: explicit key
/// when given, else the entity id, generating and back-filling one if
/// needed.
fn choose_cache_key<T: Entity>(key: Option<&str>, value: &mut T) -> String {
    match key {
        Some(k) if !k.is_empty() => k.to_string(),
        _ => {
            if value.id().is_empty() {
                value.set_id(generate_entity_id());
            }
            value.id().to_string()
        }
    }
}

impl<C: CacheStore, S: DocumentStore> TieredProvider<C, S> {
    /// Create a provider over a connected pool with default configuration.
    pub fn new(pool: Arc<ConnectionPool<C, S>>) -> Self {
        Self::with_config(pool, ProviderConfig::default())
    }

    /// Create a provider with explicit configuration.
    pub fn with_config(pool: Arc<ConnectionPool<C, S>>, config: ProviderConfig) -> Self {
        Self { pool, config }
    }

    /// The pool this provider draws its backends from.
    pub fn pool(&self) -> &Arc<ConnectionPool<C, S>> {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Write-through path
    // ------------------------------------------------------------------

    /// Write an entity to the store, then mirror it into the cache under
    /// its namespaced key. Returns the store-assigned id.
    ///
    /// A store failure aborts the call with the cache untouched. A cache
    /// failure after the store write succeeded is logged and swallowed.
    pub async fn upsert_and_cache<T: Entity>(&self, value: &mut T) -> StratumResult<String> {
        let handles = self.pool.handles()?;
        let id = handles.store().upsert(value).await?;

        let key = build_key_for::<T>(&id);
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                if let Err(e) = handles
                    .cache()
                    .set(&key, &bytes, self.config.default_ttl)
                    .await
                {
                    tracing::warn!(key = %key, error = %e, "Cache mirror failed after store write, continuing");
                }
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache encoding failed after store write, continuing");
            }
        }
        Ok(id)
    }

    /// Write an entity to the store without touching the cache. The id is
    /// normalized first: any key namespace prefixes are stripped so cache
    /// keys passed as ids do not leak into the store keyspace.
    pub async fn upsert_store_only<T: Entity>(&self, value: &mut T) -> StratumResult<String> {
        if !value.id().is_empty() {
            let normalized = strip_key_prefixes(value.id()).to_string();
            if normalized != value.id() {
                value.set_id(normalized);
            }
        }
        let handles = self.pool.handles()?;
        handles.store().upsert(value).await
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Fetch an entity by id, trying the cache first and falling back to
    /// the store on a miss.
    ///
    /// A malformed cached payload counts as a miss (logged, not evicted),
    /// and a cache backend failure falls through to the store as well. The
    /// store result is returned as-is; this path never repopulates the
    /// cache. Use [`get_or_create`] when repopulation is wanted.
    ///
    /// [`get_or_create`]: TieredProvider::get_or_create
    pub async fn get_object<T: Entity>(&self, id: &str) -> StratumResult<Option<T>> {
        require_non_empty(id, "document id")?;
        let handles = self.pool.handles()?;

        let key = build_key_for::<T>(id);
        match handles.cache().get(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "Cached payload failed to decode, falling back to store");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, falling back to store");
            }
        }

        handles.store().get_by_id::<T>(id).await
    }

    /// Memoized read with a synchronous factory. See [`get_or_create_with`].
    ///
    /// [`get_or_create_with`]: TieredProvider::get_or_create_with
    pub async fn get_or_create<T, F>(
        &self,
        key: &str,
        factory: F,
        ttl: Option<Duration>,
    ) -> StratumResult<Option<T>>
    where
        T: Typed + Serialize + DeserializeOwned + Send,
        F: FnOnce() -> StratumResult<Option<T>> + Send,
    {
        self.get_or_create_with(key, || async move { factory() }, ttl)
            .await
    }

    /// Memoized read: try the cache under the namespaced key; on a hit,
    /// return the cached value. On a miss, invoke the factory, cache a
    /// non-absent result under the given TTL, and return it.
    ///
    /// Absent factory results are never cached, so "known missing" is
    /// re-checked on every call. Factory errors propagate and leave the
    /// cache untouched. This is the only read path that repopulates the
    /// cache.
    pub async fn get_or_create_with<T, F, Fut>(
        &self,
        key: &str,
        factory: F,
        ttl: Option<Duration>,
    ) -> StratumResult<Option<T>>
    where
        T: Typed + Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = StratumResult<Option<T>>> + Send,
    {
        require_non_empty(key, "cache key")?;
        let handles = self.pool.handles()?;

        let full_key = build_key_for::<T>(key);
        match handles.cache().get(&full_key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => {
                    tracing::debug!(key = %full_key, error = %e, "Cached payload failed to decode, rebuilding from factory");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "Cache read failed, rebuilding from factory");
            }
        }

        let produced = factory().await?;
        if let Some(value) = &produced {
            match serde_json::to_vec(value) {
                Ok(bytes) => {
                    if let Err(e) = handles
                        .cache()
                        .set(&full_key, &bytes, ttl.or(self.config.default_ttl))
                        .await
                    {
                        tracing::warn!(key = %full_key, error = %e, "Cache write failed after factory, continuing");
                    }
                }
                Err(e) => {
                    tracing::warn!(key = %full_key, error = %e, "Cache encoding failed after factory, continuing");
                }
            }
        }
        Ok(produced)
    }

    // ------------------------------------------------------------------
    // Delete path
    // ------------------------------------------------------------------

    /// Remove an entity's cache entry and, when `update_store` is true, its
    /// store document. See [`delete_by_id`].
    ///
    /// [`delete_by_id`]: TieredProvider::delete_by_id
    pub async fn delete_object<T: Entity>(
        &self,
        value: &T,
        update_store: bool,
    ) -> StratumResult<()> {
        self.delete_by_id::<T>(value.id(), update_store).await
    }

    /// Remove the cache entry under the namespaced key, then the store
    /// document when `update_store` is true.
    ///
    /// The cache delete runs first and unconditionally. A cache failure
    /// propagates before the store is touched: a stale cache entry
    /// surviving a delete must never pass silently. A store failure after
    /// the cache delete also propagates; the entry stays evicted.
    pub async fn delete_by_id<T: Typed>(
        &self,
        id: &str,
        update_store: bool,
    ) -> StratumResult<()> {
        require_non_empty(id, "document id")?;
        let handles = self.pool.handles()?;

        let key = build_key_for::<T>(id);
        handles.cache().delete(&key).await?;

        if update_store {
            handles.store().delete(id).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Cache-only operations
    // ------------------------------------------------------------------

    /// Cache-only existence check under the namespaced key. Never consults
    /// the store: a negative result does not mean the record is absent
    /// there.
    pub async fn exists<T: Typed>(&self, key: &str) -> StratumResult<bool> {
        require_non_empty(key, "cache key")?;
        let handles = self.pool.handles()?;
        handles.cache().exists(&build_key_for::<T>(key)).await
    }

    /// Existence check that memoizes through the factory on a miss: true
    /// when the cache or the factory can produce a value for the key.
    pub async fn exists_or_create<T, F, Fut>(
        &self,
        key: &str,
        factory: F,
        ttl: Option<Duration>,
    ) -> StratumResult<bool>
    where
        T: Typed + Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = StratumResult<Option<T>>> + Send,
    {
        Ok(self.get_or_create_with(key, factory, ttl).await?.is_some())
    }

    /// Read a value from the cache under the namespaced key, bypassing the
    /// store.
    ///
    /// A malformed payload is treated as absent (logged, not evicted).
    /// Backend failures propagate since there is no tier to fall back to.
    pub async fn get_only_cache<T: Typed + DeserializeOwned>(
        &self,
        key: &str,
    ) -> StratumResult<Option<T>> {
        require_non_empty(key, "cache key")?;
        let handles = self.pool.handles()?;

        let full_key = build_key_for::<T>(key);
        match handles.cache().get(&full_key).await? {
            Some(bytes) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => Ok(Some(value)),
                Err(e) => {
                    tracing::debug!(key = %full_key, error = %e, "Cached payload failed to decode, treating as absent");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Write an entity to the cache only, bypassing the store. The entry
    /// lives under the namespaced key built from the logical key: a
    /// non-empty entity id wins even when an explicit key is passed, an
    /// entity without an id adopts the explicit key (generated fresh when
    /// none is given) as its id. Returns the logical key.
    ///
    /// Unlike the write-through path, failures here propagate: with no
    /// store write backing it, a lost cache write is a lost write.
    pub async fn set_only_cache<T: Entity>(
        &self,
        key: Option<&str>,
        value: &mut T,
        ttl: Option<Duration>,
    ) -> StratumResult<String> {
        let handles = self.pool.handles()?;

        let raw = if value.id().is_empty() {
            let chosen = match key {
                Some(k) if !k.is_empty() => k.to_string(),
                _ => generate_entity_id(),
            };
            value.set_id(chosen.clone());
            chosen
        } else {
            value.id().to_string()
        };

        let full_key = build_key_for::<T>(&raw);
        let bytes = serde_json::to_vec(value).map_err(|e| CacheError::Encode {
            key: full_key.clone(),
            reason: e.to_string(),
        })?;
        handles
            .cache()
            .set(&full_key, &bytes, ttl.or(self.config.default_ttl))
            .await?;
        Ok(raw)
    }

    /// Write an entity to the cache under the namespaced key, optionally
    /// writing it through to the store first. The logical key is the
    /// explicit one when given, else the entity id, generated and
    /// back-filled when that is empty too. Returns the logical key.
    ///
    /// With `update_store` the store write leads and its failure aborts the
    /// call; the cache phase is then best-effort. Without it the cache
    /// write is the whole operation and its failure propagates.
    pub async fn set_object<T: Entity>(
        &self,
        key: Option<&str>,
        value: &mut T,
        ttl: Option<Duration>,
        update_store: bool,
    ) -> StratumResult<String> {
        let handles = self.pool.handles()?;

        if !update_store {
            let raw = choose_cache_key(key, value);
            let full_key = build_key_for::<T>(&raw);
            let bytes = serde_json::to_vec(value).map_err(|e| CacheError::Encode {
                key: full_key.clone(),
                reason: e.to_string(),
            })?;
            handles
                .cache()
                .set(&full_key, &bytes, ttl.or(self.config.default_ttl))
                .await?;
            return Ok(raw);
        }

        handles.store().upsert(value).await?;

        let raw = choose_cache_key(key, value);
        let full_key = build_key_for::<T>(&raw);
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                if let Err(e) = handles
                    .cache()
                    .set(&full_key, &bytes, ttl.or(self.config.default_ttl))
                    .await
                {
                    tracing::warn!(key = %full_key, error = %e, "Cache mirror failed after store write, continuing");
                }
            }
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "Cache encoding failed after store write, continuing");
            }
        }
        Ok(raw)
    }

    // ------------------------------------------------------------------
    // Capped list operations
    // ------------------------------------------------------------------

    /// Append an item to the sorted list under a raw key, scored by the
    /// current wall-clock time so iteration order is insertion order.
    pub async fn add_to_list<T: Serialize + Sync>(
        &self,
        key: &str,
        item: &T,
    ) -> StratumResult<()> {
        require_non_empty(key, "list key")?;
        let handles = self.pool.handles()?;

        let bytes = serde_json::to_vec(item).map_err(|e| CacheError::Encode {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        let score = chrono::Utc::now().timestamp_millis() as f64;
        handles.cache().sorted_set_add(key, &bytes, score).await
    }

    /// Append an item and then cap the list: when `limit` is given, the
    /// oldest entries beyond it are dropped, keeping the newest `limit`.
    pub async fn add_to_list_and_trim<T: Serialize + Sync>(
        &self,
        key: &str,
        item: &T,
        limit: Option<usize>,
    ) -> StratumResult<()> {
        self.add_to_list(key, item).await?;
        if let Some(limit) = limit {
            let handles = self.pool.handles()?;
            handles.cache().sorted_set_trim_oldest(key, limit).await?;
        }
        Ok(())
    }

    /// All list items in insertion order. Items that no longer decode are
    /// skipped.
    pub async fn get_sorted_set<T: DeserializeOwned>(&self, key: &str) -> StratumResult<Vec<T>> {
        self.get_sorted_set_range(key, f64::NEG_INFINITY, f64::INFINITY)
            .await
    }

    /// List items whose scores fall within `[min, max]`, ascending.
    pub async fn get_sorted_set_range<T: DeserializeOwned>(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> StratumResult<Vec<T>> {
        require_non_empty(key, "list key")?;
        let handles = self.pool.handles()?;

        let members = handles
            .cache()
            .sorted_set_range_by_score(key, min, max)
            .await?;
        let mut items = Vec::with_capacity(members.len());
        for member in members {
            match serde_json::from_slice(&member) {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "Skipping list member that failed to decode");
                }
            }
        }
        Ok(items)
    }

    /// Number of items in the list under `key`.
    pub async fn list_count(&self, key: &str) -> StratumResult<u64> {
        require_non_empty(key, "list key")?;
        let handles = self.pool.handles()?;
        handles.cache().sorted_set_len(key).await
    }

    /// Remove an item from the list. Returns whether it was present.
    pub async fn remove_from_list<T: Serialize + Sync>(
        &self,
        key: &str,
        item: &T,
    ) -> StratumResult<bool> {
        require_non_empty(key, "list key")?;
        let handles = self.pool.handles()?;

        let bytes = serde_json::to_vec(item).map_err(|e| CacheError::Encode {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        handles.cache().sorted_set_remove(key, &bytes).await
    }

    /// Drop the whole list. Returns whether anything was removed.
    pub async fn clear_list(&self, key: &str) -> StratumResult<bool> {
        require_non_empty(key, "list key")?;
        let handles = self.pool.handles()?;
        handles.cache().delete(key).await
    }

    /// Statistics from the cache tier.
    pub async fn cache_stats(&self) -> StratumResult<CacheStats> {
        let handles = self.pool.handles()?;
        handles.cache().stats().await
    }
}
