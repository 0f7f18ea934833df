//! Cache store abstraction.
//!
//! The provider talks to the volatile tier through [`CacheStore`], which any
//! key-value backend with string keys, byte values, and per-entry expiry can
//! implement. Serialization stays out of the trait: the provider hands
//! backends opaque bytes, so a backend never needs to know entity types.

use std::time::Duration;

use async_trait::async_trait;
use stratum_core::StratumResult;

/// Cache backend trait for pluggable volatile-tier implementations.
///
/// Implementations must be thread-safe; the provider shares one instance
/// across any number of concurrent callers and relies on the backend for
/// per-key atomicity of individual operations. No cross-key transactions are
/// expected.
///
/// Plain entries and sorted sets share a single keyspace: [`delete`] removes
/// a key of either kind, and [`exists`] sees both.
///
/// [`delete`]: CacheStore::delete
/// [`exists`]: CacheStore::exists
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the raw payload stored under `key`, or None when the key is
    /// absent or expired.
    async fn get(&self, key: &str) -> StratumResult<Option<Vec<u8>>>;

    /// Store a payload under `key`, replacing any previous value. A `ttl`
    /// of None means the entry never expires.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StratumResult<()>;

    /// Remove `key`. Returns whether anything was removed.
    async fn delete(&self, key: &str) -> StratumResult<bool>;

    /// Whether `key` currently holds a live value.
    async fn exists(&self, key: &str) -> StratumResult<bool>;

    /// Add a member to the sorted set under `key`, or update its score if
    /// the member is already present.
    async fn sorted_set_add(&self, key: &str, member: &[u8], score: f64) -> StratumResult<()>;

    /// Drop the lowest-scored members until at most `keep` remain. Returns
    /// the number of members removed.
    async fn sorted_set_trim_oldest(&self, key: &str, keep: usize) -> StratumResult<u64>;

    /// Members with scores in `[min, max]`, ascending by score.
    async fn sorted_set_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> StratumResult<Vec<Vec<u8>>>;

    /// Number of members in the sorted set under `key`.
    async fn sorted_set_len(&self, key: &str) -> StratumResult<u64>;

    /// Remove a member from the sorted set under `key`. Returns whether the
    /// member was present.
    async fn sorted_set_remove(&self, key: &str, member: &[u8]) -> StratumResult<bool>;

    /// Get cache statistics.
    async fn stats(&self) -> StratumResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in the cache.
    pub entry_count: u64,
    /// Number of entries dropped because their TTL lapsed.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
