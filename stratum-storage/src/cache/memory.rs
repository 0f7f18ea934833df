//! In-memory cache store.
//!
//! Reference [`CacheStore`] backend over process-local hash maps. Expiry is
//! checked lazily on access, so an expired entry occupies memory until the
//! next read or write touches its key. Suitable for tests and single-process
//! deployments; nothing survives a restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use stratum_core::StratumResult;

use crate::cache::traits::{CacheStats, CacheStore};

// ============================================================================
// Entry Types
// ============================================================================

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
struct ScoredMember {
    score: f64,
    member: Vec<u8>,
}

// ============================================================================
// In-Memory Cache Store
// ============================================================================

/// Process-local cache backend.
///
/// Plain entries and sorted sets live in separate maps but share one logical
/// keyspace: `delete` clears a key from both, and `exists` answers true if
/// either map holds a live value for it.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: tokio::sync::RwLock<HashMap<String, CacheEntry>>,
    sorted_sets: tokio::sync::RwLock<HashMap<String, Vec<ScoredMember>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl InMemoryCacheStore {
    /// Create an empty cache store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> StratumResult<Option<Vec<u8>>> {
        // Write lock so a lapsed entry can be dropped on the spot.
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.value.clone()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StratumResult<()> {
        let entry = CacheEntry {
            value: value.to_vec(),
            expires_at: ttl.map(|t| Instant::now() + t),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StratumResult<bool> {
        let removed_entry = self.entries.write().await.remove(key).is_some();
        let removed_set = self.sorted_sets.write().await.remove(key).is_some();
        Ok(removed_entry || removed_set)
    }

    async fn exists(&self, key: &str) -> StratumResult<bool> {
        {
            let mut entries = self.entries.write().await;
            match entries.get(key) {
                Some(entry) if entry.is_expired() => {
                    entries.remove(key);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                Some(_) => return Ok(true),
                None => {}
            }
        }
        let sets = self.sorted_sets.read().await;
        Ok(sets.get(key).is_some_and(|members| !members.is_empty()))
    }

    async fn sorted_set_add(&self, key: &str, member: &[u8], score: f64) -> StratumResult<()> {
        let mut sets = self.sorted_sets.write().await;
        let members = sets.entry(key.to_string()).or_default();
        match members.iter_mut().find(|m| m.member == member) {
            Some(existing) => existing.score = score,
            None => members.push(ScoredMember {
                score,
                member: member.to_vec(),
            }),
        }
        Ok(())
    }

    async fn sorted_set_trim_oldest(&self, key: &str, keep: usize) -> StratumResult<u64> {
        let mut sets = self.sorted_sets.write().await;
        let Some(members) = sets.get_mut(key) else {
            return Ok(0);
        };
        if members.len() <= keep {
            return Ok(0);
        }
        members.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.member.cmp(&b.member))
        });
        let excess = members.len() - keep;
        members.drain(..excess);
        Ok(excess as u64)
    }

    async fn sorted_set_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> StratumResult<Vec<Vec<u8>>> {
        let sets = self.sorted_sets.read().await;
        let Some(members) = sets.get(key) else {
            return Ok(Vec::new());
        };
        let mut in_range: Vec<&ScoredMember> = members
            .iter()
            .filter(|m| m.score >= min && m.score <= max)
            .collect();
        in_range.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.member.cmp(&b.member))
        });
        Ok(in_range.into_iter().map(|m| m.member.clone()).collect())
    }

    async fn sorted_set_len(&self, key: &str) -> StratumResult<u64> {
        let sets = self.sorted_sets.read().await;
        Ok(sets.get(key).map_or(0, |members| members.len() as u64))
    }

    async fn sorted_set_remove(&self, key: &str, member: &[u8]) -> StratumResult<bool> {
        let mut sets = self.sorted_sets.write().await;
        let Some(members) = sets.get_mut(key) else {
            return Ok(false);
        };
        let before = members.len();
        members.retain(|m| m.member != member);
        Ok(members.len() < before)
    }

    async fn stats(&self) -> StratumResult<CacheStats> {
        let entry_count = {
            let entries = self.entries.read().await;
            let sets = self.sorted_sets.read().await;
            entries.len() as u64 + sets.len() as u64
        };
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count,
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let cache = InMemoryCacheStore::new();
        cache
            .set("user:1", b"payload", None)
            .await
            .expect("set should succeed");

        let value = cache.get("user:1").await.expect("get should succeed");
        assert_eq!(value.as_deref(), Some(b"payload".as_slice()));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let cache = InMemoryCacheStore::new();
        let value = cache.get("absent").await.expect("get should succeed");
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_set_replaces_previous_value() {
        let cache = InMemoryCacheStore::new();
        cache
            .set("k", b"old", None)
            .await
            .expect("set should succeed");
        cache
            .set("k", b"new", None)
            .await
            .expect("set should succeed");

        let value = cache.get("k").await.expect("get should succeed");
        assert_eq!(value.as_deref(), Some(b"new".as_slice()));
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = InMemoryCacheStore::new();
        cache
            .set("ephemeral", b"v", Some(Duration::from_millis(10)))
            .await
            .expect("set should succeed");

        tokio::time::sleep(Duration::from_millis(30)).await;

        let value = cache.get("ephemeral").await.expect("get should succeed");
        assert!(value.is_none());

        let stats = cache.stats().await.expect("stats should succeed");
        assert_eq!(stats.evictions, 1);
    }

    #[tokio::test]
    async fn test_delete_returns_whether_removed() {
        let cache = InMemoryCacheStore::new();
        cache
            .set("k", b"v", None)
            .await
            .expect("set should succeed");

        assert!(cache.delete("k").await.expect("delete should succeed"));
        assert!(!cache.delete("k").await.expect("delete should succeed"));
        assert!(cache
            .get("k")
            .await
            .expect("get should succeed")
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_clears_sorted_set_under_same_key() {
        let cache = InMemoryCacheStore::new();
        cache
            .sorted_set_add("feed", b"a", 1.0)
            .await
            .expect("add should succeed");

        assert!(cache.delete("feed").await.expect("delete should succeed"));
        let len = cache
            .sorted_set_len("feed")
            .await
            .expect("len should succeed");
        assert_eq!(len, 0);
    }

    #[tokio::test]
    async fn test_exists_sees_entries_and_sets() {
        let cache = InMemoryCacheStore::new();
        assert!(!cache.exists("k").await.expect("exists should succeed"));

        cache
            .set("k", b"v", None)
            .await
            .expect("set should succeed");
        assert!(cache.exists("k").await.expect("exists should succeed"));

        cache
            .sorted_set_add("feed", b"a", 1.0)
            .await
            .expect("add should succeed");
        assert!(cache.exists("feed").await.expect("exists should succeed"));
    }

    #[tokio::test]
    async fn test_exists_expired_entry_is_absent() {
        let cache = InMemoryCacheStore::new();
        cache
            .set("ephemeral", b"v", Some(Duration::from_millis(10)))
            .await
            .expect("set should succeed");

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(!cache
            .exists("ephemeral")
            .await
            .expect("exists should succeed"));
    }

    #[tokio::test]
    async fn test_sorted_set_add_updates_existing_member_score() {
        let cache = InMemoryCacheStore::new();
        cache
            .sorted_set_add("feed", b"a", 1.0)
            .await
            .expect("add should succeed");
        cache
            .sorted_set_add("feed", b"a", 9.0)
            .await
            .expect("add should succeed");

        let len = cache
            .sorted_set_len("feed")
            .await
            .expect("len should succeed");
        assert_eq!(len, 1);

        // Updated score moves the member out of the low range.
        let low = cache
            .sorted_set_range_by_score("feed", 0.0, 5.0)
            .await
            .expect("range should succeed");
        assert!(low.is_empty());
    }

    #[tokio::test]
    async fn test_sorted_set_range_orders_by_score() {
        let cache = InMemoryCacheStore::new();
        cache
            .sorted_set_add("feed", b"c", 3.0)
            .await
            .expect("add should succeed");
        cache
            .sorted_set_add("feed", b"a", 1.0)
            .await
            .expect("add should succeed");
        cache
            .sorted_set_add("feed", b"b", 2.0)
            .await
            .expect("add should succeed");

        let members = cache
            .sorted_set_range_by_score("feed", f64::NEG_INFINITY, f64::INFINITY)
            .await
            .expect("range should succeed");
        assert_eq!(members, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[tokio::test]
    async fn test_sorted_set_trim_drops_lowest_scores() {
        let cache = InMemoryCacheStore::new();
        for (member, score) in [(b"a", 1.0), (b"b", 2.0), (b"c", 3.0), (b"d", 4.0)] {
            cache
                .sorted_set_add("feed", member, score)
                .await
                .expect("add should succeed");
        }

        let removed = cache
            .sorted_set_trim_oldest("feed", 2)
            .await
            .expect("trim should succeed");
        assert_eq!(removed, 2);

        let members = cache
            .sorted_set_range_by_score("feed", f64::NEG_INFINITY, f64::INFINITY)
            .await
            .expect("range should succeed");
        assert_eq!(members, vec![b"c".to_vec(), b"d".to_vec()]);
    }

    #[tokio::test]
    async fn test_sorted_set_trim_noop_when_under_limit() {
        let cache = InMemoryCacheStore::new();
        cache
            .sorted_set_add("feed", b"a", 1.0)
            .await
            .expect("add should succeed");

        let removed = cache
            .sorted_set_trim_oldest("feed", 5)
            .await
            .expect("trim should succeed");
        assert_eq!(removed, 0);

        let removed = cache
            .sorted_set_trim_oldest("missing", 5)
            .await
            .expect("trim should succeed");
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn test_sorted_set_remove() {
        let cache = InMemoryCacheStore::new();
        cache
            .sorted_set_add("feed", b"a", 1.0)
            .await
            .expect("add should succeed");

        assert!(cache
            .sorted_set_remove("feed", b"a")
            .await
            .expect("remove should succeed"));
        assert!(!cache
            .sorted_set_remove("feed", b"a")
            .await
            .expect("remove should succeed"));
    }

    #[tokio::test]
    async fn test_stats_track_hits_and_misses() {
        let cache = InMemoryCacheStore::new();
        cache
            .set("k", b"v", None)
            .await
            .expect("set should succeed");

        cache.get("k").await.expect("get should succeed");
        cache.get("k").await.expect("get should succeed");
        cache.get("absent").await.expect("get should succeed");

        let stats = cache.stats().await.expect("stats should succeed");
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 0.001);
    }
}
