//! Connection pool with explicit lifecycle.
//!
//! A [`ConnectionPool`] owns one cache backend and one document backend and
//! hands out shared [`Handles`] to both. The pool is an ordinary value with
//! no process-global state: construct it to connect, call [`teardown`] to
//! release the backends, and every later [`handles`] call reports the pool
//! as unavailable instead of touching freed resources.
//!
//! [`teardown`]: ConnectionPool::teardown
//! [`handles`]: ConnectionPool::handles

use std::sync::{Arc, RwLock};

use stratum_core::{StratumError, StratumResult};

use crate::cache::CacheStore;
use crate::store::DocumentStore;

/// Shared references to both tiers of a connected pool.
///
/// Cheap to clone; all clones point at the same backend instances.
#[derive(Debug)]
pub struct Handles<C, S> {
    cache: Arc<C>,
    store: Arc<S>,
}

impl<C, S> Clone for Handles<C, S> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            store: Arc::clone(&self.store),
        }
    }
}

impl<C: CacheStore, S: DocumentStore> Handles<C, S> {
    /// The volatile tier.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// The durable tier.
    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Holds the backends for both tiers behind a connected/torn-down state.
///
/// The inner Option is the whole state machine: Some means connected, None
/// means torn down. Teardown is one-way; build a new pool to reconnect.
#[derive(Debug)]
pub struct ConnectionPool<C, S> {
    inner: RwLock<Option<Handles<C, S>>>,
}

impl<C: CacheStore, S: DocumentStore> ConnectionPool<C, S> {
    /// Build a connected pool from backend instances.
    pub fn connect(cache: C, store: S) -> Self {
        Self {
            inner: RwLock::new(Some(Handles {
                cache: Arc::new(cache),
                store: Arc::new(store),
            })),
        }
    }

    /// Get handles to both tiers.
    ///
    /// Fails with [`StratumError::PoolUnavailable`] once the pool has been
    /// torn down (or its lock poisoned), so callers holding a pool reference
    /// past teardown get an error rather than stale backends.
    pub fn handles(&self) -> StratumResult<Handles<C, S>> {
        let guard = self.inner.read().map_err(|_| StratumError::PoolUnavailable {
            reason: "connection pool lock poisoned".to_string(),
        })?;
        guard
            .as_ref()
            .cloned()
            .ok_or_else(|| StratumError::PoolUnavailable {
                reason: "connection pool has been torn down".to_string(),
            })
    }

    /// Release both backends. Returns whether the pool was still connected.
    /// Handles cloned out earlier keep their backends alive until dropped.
    pub fn teardown(&self) -> bool {
        self.inner
            .write()
            .map(|mut guard| guard.take().is_some())
            .unwrap_or(false)
    }

    /// Whether the pool currently holds live backends.
    pub fn is_connected(&self) -> bool {
        self.inner
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheStore;
    use crate::store::InMemoryDocumentStore;

    fn memory_pool() -> ConnectionPool<InMemoryCacheStore, InMemoryDocumentStore> {
        ConnectionPool::connect(InMemoryCacheStore::new(), InMemoryDocumentStore::new())
    }

    #[tokio::test]
    async fn test_connected_pool_hands_out_backends() {
        let pool = memory_pool();
        assert!(pool.is_connected());

        let handles = pool.handles().expect("handles should succeed");
        handles
            .cache()
            .set("k", b"v", None)
            .await
            .expect("set should succeed");

        let again = pool.handles().expect("handles should succeed");
        let value = again.cache().get("k").await.expect("get should succeed");
        assert_eq!(value.as_deref(), Some(b"v".as_slice()));
    }

    #[test]
    fn test_teardown_disconnects() {
        let pool = memory_pool();

        assert!(pool.teardown());
        assert!(!pool.is_connected());
        assert!(!pool.teardown());

        let err = pool.handles().expect_err("handles should fail");
        assert!(matches!(err, StratumError::PoolUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_handles_outlive_teardown() {
        let pool = memory_pool();
        let handles = pool.handles().expect("handles should succeed");

        pool.teardown();

        // Existing handles still reach the backends they were cloned from.
        handles
            .cache()
            .set("k", b"v", None)
            .await
            .expect("set should succeed");
    }
}
