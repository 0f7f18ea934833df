//! Document entity contract.
//!
//! Every stored object satisfies four capabilities: it has an identifier, it
//! is timestamped, it carries a static logical type tag, and it can be soft
//! deleted. The generic cache and store operations are written against these
//! traits rather than against a concrete base type, so any struct that
//! implements them can move through the two tiers.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Has a string identifier, assigned by the store on first persist when left
/// empty.
pub trait Identified {
    /// The identifier. Empty until first persist.
    fn id(&self) -> &str;

    /// Replace the identifier. The store calls this exactly once when it
    /// assigns an id to a document persisted with an empty one.
    fn set_id(&mut self, id: String);
}

/// Carries creation and modification timestamps.
pub trait Timestamped {
    /// Set once at construction, never mutated afterwards.
    fn created(&self) -> Timestamp;

    fn updated(&self) -> Option<Timestamp>;

    /// Record a modification time.
    fn set_updated(&mut self, at: Timestamp);
}

/// Declares the logical type tag used for cache-key namespacing and
/// store-side filtering.
///
/// The tag is a declared constant rather than the runtime type name, so
/// renaming a Rust type never silently moves its documents to a different
/// key namespace.
pub trait Typed {
    /// Lowercase, stable across refactors, and must not contain ':'.
    const TYPE_TAG: &'static str;

    fn type_tag(&self) -> &'static str {
        Self::TYPE_TAG
    }
}

/// Supports logical deletion without physical removal from the store.
pub trait SoftDeletable {
    fn is_deleted(&self) -> bool;

    fn set_deleted(&mut self, deleted: bool);
}

/// The full contract the two-tier provider operates on: the four document
/// capabilities plus the bounds needed to serialize across both tiers and to
/// share values between tasks.
pub trait Entity:
    Identified
    + Timestamped
    + Typed
    + SoftDeletable
    + Clone
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<T> Entity for T where
    T: Identified
        + Timestamped
        + Typed
        + SoftDeletable
        + Clone
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Common document fields, meant to be `#[serde(flatten)]`ed into concrete
/// entities under a field named `meta`.
///
/// [`impl_document_meta!`](crate::impl_document_meta) derives the capability
/// impls that delegate here; [`Typed`] stays hand-written because the tag is
/// a deliberate, stable choice per entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Empty until the store assigns an id on first persist.
    #[serde(default)]
    pub id: String,
    /// Set once at construction.
    pub created: Timestamp,
    /// Set on modification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<Timestamp>,
    /// Soft-delete marker. The store keeps the record.
    #[serde(default)]
    pub is_deleted: bool,
}

impl DocumentMeta {
    /// Meta block with the id left for the store to assign.
    pub fn new() -> Self {
        Self {
            id: String::new(),
            created: Utc::now(),
            updated: None,
            is_deleted: false,
        }
    }

    /// Meta block with a caller-side random id assigned up front.
    pub fn with_generated_id() -> Self {
        Self {
            id: crate::generate_entity_id(),
            ..Self::new()
        }
    }

    /// Meta block with a known id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new()
        }
    }
}

impl Default for DocumentMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Implement [`Identified`], [`Timestamped`], and [`SoftDeletable`] for an
/// entity struct that keeps its common fields in a `meta: DocumentMeta`
/// field.
#[macro_export]
macro_rules! impl_document_meta {
    ($entity:ty) => {
        impl $crate::Identified for $entity {
            fn id(&self) -> &str {
                &self.meta.id
            }

            fn set_id(&mut self, id: String) {
                self.meta.id = id;
            }
        }

        impl $crate::Timestamped for $entity {
            fn created(&self) -> $crate::Timestamp {
                self.meta.created
            }

            fn updated(&self) -> Option<$crate::Timestamp> {
                self.meta.updated
            }

            fn set_updated(&mut self, at: $crate::Timestamp) {
                self.meta.updated = Some(at);
            }
        }

        impl $crate::SoftDeletable for $entity {
            fn is_deleted(&self) -> bool {
                self.meta.is_deleted
            }

            fn set_deleted(&mut self, deleted: bool) {
                self.meta.is_deleted = deleted;
            }
        }
    };
}

// ============================================================================
// TESTS
// ============================================================================
