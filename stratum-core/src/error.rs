//! Error types for Stratum operations

use thiserror::Error;

/// Cache tier errors.
///
/// Absence of a value is never an error; reads return `Ok(None)`. These
/// variants cover the cases where the cache itself misbehaved.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Failed to encode cache payload for key {key}: {reason}")]
    Encode { key: String, reason: String },

    #[error("Malformed cache payload under key {key}: {reason}")]
    MalformedPayload { key: String, reason: String },
}

/// Document store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Document store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Failed to serialize document {id}: {reason}")]
    Serialization { id: String, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Master error type for all Stratum operations.
#[derive(Debug, Clone, Error)]
pub enum StratumError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Connection pool unavailable: {reason}")]
    PoolUnavailable { reason: String },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },
}

/// Result type alias for Stratum operations.
pub type StratumResult<T> = Result<T, StratumError>;

// =============================================================================
// TESTS
// =============================================================================
