//! Volatile cache tier.
//!
//! This module provides the cache side of the two-tier stack:
//! - `traits`: the [`CacheStore`] backend abstraction and [`CacheStats`]
//! - `memory`: process-local reference backend

pub mod memory;
pub mod traits;

pub use memory::InMemoryCacheStore;
pub use traits::{CacheStats, CacheStore};
