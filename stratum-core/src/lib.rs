//! Stratum Core - Entity Contract and Shared Types
//!
//! Pure data contracts for the two-tier store: capability traits for stored
//! documents, cache-key construction, id generation, and the error taxonomy.
//! No I/O lives here; the backends and the provider are in stratum-storage.

pub mod entity;
pub mod error;
pub mod key;

pub use entity::{DocumentMeta, Entity, Identified, SoftDeletable, Timestamped, Typed};
pub use error::{CacheError, StoreError, StratumError, StratumResult};
pub use key::{build_key, build_key_for, strip_key_prefixes};

use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Default expiry for cache entries populated through link resolution.
/// Entries resolved through a lazy link are refetched after a week at most,
/// trading staleness risk for bounded cache growth.
pub const RESOLVER_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Generate a compact random document identifier.
///
/// 128 random bits rendered as 32 lowercase hex characters with no
/// separators, so the result is safe in cache keys and store ids alike and
/// needs no coordination with the store to stay collision-free.
pub fn generate_entity_id() -> String {
    Uuid::new_v4().simple().to_string()
}

// ============================================================================
// TESTS
// ============================================================================
