//! LMDB-backed document store.
//!
//! Persistent [`DocumentStore`] backend over a memory-mapped LMDB
//! environment. Envelopes are stored as JSON bytes in a single named
//! database keyed by document id; collections map to additional named
//! databases inside the same environment.
//!
//! All LMDB work is synchronous and completes before the surrounding future
//! yields, so no transaction is ever held across an await point.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions};
use stratum_core::entity::{Entity, Typed};
use stratum_core::{StoreError, StratumError, StratumResult};

use crate::store::{ensure_id, DocumentEnvelope, DocumentStore};

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by the LMDB backend.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    #[error("Failed to open LMDB database: {0}")]
    DbOpen(String),

    #[error("LMDB transaction failed: {0}")]
    Transaction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for StratumError {
    fn from(e: LmdbStoreError) -> Self {
        StratumError::Store(StoreError::Unavailable {
            reason: e.to_string(),
        })
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the LMDB document store.
#[derive(Debug, Clone)]
pub struct LmdbStoreConfig {
    /// Directory holding the environment files. Created if absent.
    pub path: PathBuf,
    /// Maximum size of the memory map in megabytes.
    pub max_size_mb: usize,
}

impl Default for LmdbStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./stratum-data"),
            max_size_mb: 256,
        }
    }
}

impl LmdbStoreConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset:
    /// - `STRATUM_STORE_PATH`: environment directory
    /// - `STRATUM_STORE_MAX_SIZE_MB`: memory map size in megabytes
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            path: std::env::var("STRATUM_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.path),
            max_size_mb: std::env::var("STRATUM_STORE_MAX_SIZE_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_size_mb),
        }
    }

    /// Set the environment directory.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the memory map size in megabytes.
    pub fn with_max_size_mb(mut self, max_size_mb: usize) -> Self {
        self.max_size_mb = max_size_mb;
        self
    }
}

// ============================================================================
// LMDB Document Store
// ============================================================================

const DOCUMENTS_DB: &str = "documents";

/// Maximum number of named databases in the environment. The documents
/// database takes one slot; the rest are available for collections.
const MAX_DBS: u32 = 16;

/// Persistent document store backed by LMDB.
pub struct LmdbDocumentStore {
    env: Env,
    db: Database<Str, Bytes>,
}

impl LmdbDocumentStore {
    /// Open (or create) an environment at the configured path.
    pub fn open(config: &LmdbStoreConfig) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&config.path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(config.max_size_mb * 1024 * 1024)
                .max_dbs(MAX_DBS)
                .open(&config.path)
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        let db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, Some(DOCUMENTS_DB))
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(Self { env, db })
    }

    /// Open an environment at `path` with default sizing.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, LmdbStoreError> {
        Self::open(&LmdbStoreConfig::default().with_path(path.as_ref()))
    }

    fn decode_envelope(id: &str, bytes: &[u8]) -> Option<DocumentEnvelope> {
        match serde_json::from_slice(bytes) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                tracing::warn!(
                    id = %id,
                    error = %e,
                    "Stored envelope failed to decode, treating as absent"
                );
                None
            }
        }
    }
}

#[async_trait]
impl DocumentStore for LmdbDocumentStore {
    async fn upsert<T: Entity>(&self, value: &mut T) -> StratumResult<String> {
        let id = ensure_id(value);
        let envelope = DocumentEnvelope::wrap(value).map_err(|e| StoreError::Serialization {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        let bytes = serde_json::to_vec(&envelope).map_err(|e| StoreError::Serialization {
            id: id.clone(),
            reason: e.to_string(),
        })?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        self.db
            .put(&mut wtxn, &id, &bytes)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(id)
    }

    async fn get_by_id<T: Entity>(&self, id: &str) -> StratumResult<Option<T>> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        let bytes = self
            .db
            .get(&rtxn, id)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(bytes
            .and_then(|b| Self::decode_envelope(id, b))
            .and_then(DocumentEnvelope::into_document))
    }

    async fn delete(&self, id: &str) -> StratumResult<()> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        self.db
            .delete(&mut wtxn, id)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        Ok(())
    }

    async fn query<T, P>(&self, predicate: P) -> StratumResult<Vec<T>>
    where
        T: Entity,
        P: Fn(&T) -> bool + Send,
    {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut results = Vec::new();
        for item in iter {
            let (id, bytes) = item.map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            let Some(envelope) = Self::decode_envelope(id, bytes) else {
                continue;
            };
            if envelope.doc_type != T::TYPE_TAG {
                continue;
            }
            if let Some(value) = envelope.into_document::<T>() {
                if predicate(&value) {
                    results.push(value);
                }
            }
        }
        Ok(results)
    }

    async fn ensure_collection(&self, name: &str) -> StratumResult<()> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        let _db: Database<Str, Bytes> = self
            .env
            .create_database(&mut wtxn, Some(name))
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        Ok(())
    }

    async fn purge_all(&self) -> StratumResult<()> {
        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        self.db
            .clear(&mut wtxn)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        Ok(())
    }

    async fn health_check(&self) -> StratumResult<()> {
        let wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use stratum_core::entity::{DocumentMeta, Identified};
    use stratum_core::impl_document_meta;
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Widget {
        #[serde(flatten)]
        meta: DocumentMeta,
        label: String,
    }

    impl_document_meta!(Widget);

    impl Typed for Widget {
        const TYPE_TAG: &'static str = "widget";
    }

    fn widget(id: &str, label: &str) -> Widget {
        Widget {
            meta: DocumentMeta::with_id(id),
            label: label.to_string(),
        }
    }

    fn open_store(dir: &TempDir) -> LmdbDocumentStore {
        LmdbDocumentStore::open_at(dir.path()).expect("open should succeed")
    }

    #[tokio::test]
    async fn test_upsert_get_roundtrip() {
        let dir = TempDir::new().expect("tempdir should succeed");
        let store = open_store(&dir);

        let mut w = widget("widget:1", "sprocket");
        let id = store.upsert(&mut w).await.expect("upsert should succeed");

        let back: Widget = store
            .get_by_id(&id)
            .await
            .expect("get should succeed")
            .expect("should be stored");
        assert_eq!(back.label, "sprocket");
    }

    #[tokio::test]
    async fn test_upsert_assigns_id_when_empty() {
        let dir = TempDir::new().expect("tempdir should succeed");
        let store = open_store(&dir);

        let mut w = widget("", "sprocket");
        let id = store.upsert(&mut w).await.expect("upsert should succeed");
        assert!(!id.is_empty());
        assert_eq!(w.id(), id);
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = TempDir::new().expect("tempdir should succeed");
        {
            let store = open_store(&dir);
            let mut w = widget("widget:1", "sprocket");
            store.upsert(&mut w).await.expect("upsert should succeed");
        }

        let reopened = open_store(&dir);
        let back: Option<Widget> = reopened
            .get_by_id("widget:1")
            .await
            .expect("get should succeed");
        assert_eq!(back.expect("should persist").label, "sprocket");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = TempDir::new().expect("tempdir should succeed");
        let store = open_store(&dir);

        let mut w = widget("widget:1", "sprocket");
        store.upsert(&mut w).await.expect("upsert should succeed");

        store.delete("widget:1").await.expect("delete should succeed");
        store.delete("widget:1").await.expect("delete should succeed");

        let back: Option<Widget> = store
            .get_by_id("widget:1")
            .await
            .expect("get should succeed");
        assert!(back.is_none());
    }

    #[tokio::test]
    async fn test_query_scans_by_type_and_predicate() {
        let dir = TempDir::new().expect("tempdir should succeed");
        let store = open_store(&dir);

        for (id, label) in [("widget:1", "alpha"), ("widget:2", "beta")] {
            let mut w = widget(id, label);
            store.upsert(&mut w).await.expect("upsert should succeed");
        }

        let betas: Vec<Widget> = store
            .query(|w: &Widget| w.label == "beta")
            .await
            .expect("query should succeed");
        assert_eq!(betas.len(), 1);
        assert_eq!(betas[0].id(), "widget:2");
    }

    #[tokio::test]
    async fn test_purge_all_clears_documents() {
        let dir = TempDir::new().expect("tempdir should succeed");
        let store = open_store(&dir);

        let mut w = widget("widget:1", "sprocket");
        store.upsert(&mut w).await.expect("upsert should succeed");
        store.purge_all().await.expect("purge should succeed");

        let back: Option<Widget> = store
            .get_by_id("widget:1")
            .await
            .expect("get should succeed");
        assert!(back.is_none());
    }

    #[tokio::test]
    async fn test_ensure_collection_and_health() {
        let dir = TempDir::new().expect("tempdir should succeed");
        let store = open_store(&dir);

        store
            .ensure_collection("users")
            .await
            .expect("ensure should succeed");
        store
            .ensure_collection("users")
            .await
            .expect("ensure should succeed");
        store.health_check().await.expect("health should succeed");
    }

    #[test]
    fn test_config_defaults() {
        let config = LmdbStoreConfig::default();
        assert_eq!(config.max_size_mb, 256);
        assert_eq!(config.path, PathBuf::from("./stratum-data"));

        let tuned = LmdbStoreConfig::default()
            .with_path("/tmp/stratum-test")
            .with_max_size_mb(64);
        assert_eq!(tuned.max_size_mb, 64);
        assert_eq!(tuned.path, PathBuf::from("/tmp/stratum-test"));
    }
}
