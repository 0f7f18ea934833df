//! Cache key construction.
//!
//! Keys are lowercase `"{tag}:{raw_id}"`, with the tag taken from
//! [`Typed::TYPE_TAG`]. Construction is idempotent: a raw id that already
//! starts with the tag prefix comes back unchanged (after lowercasing), so a
//! key can be rebuilt from either a raw id or a previously built key. The
//! namespace keeps entities of different types apart even when they share a
//! raw identifier.

use crate::entity::Typed;

/// Build a namespaced cache key from a type tag and a raw identifier.
///
/// The already-prefixed check is an exact `"{tag}:"` prefix match on the
/// lowercased raw id; an id that merely contains the tag somewhere else is
/// still prefixed. An empty raw id yields the degenerate key `"{tag}:"`.
pub fn build_key(tag: &str, raw_id: &str) -> String {
    let prefix = format!("{}:", tag.to_lowercase());
    let raw = raw_id.to_lowercase();
    if raw.starts_with(&prefix) {
        return raw;
    }
    format!("{}{}", prefix, raw)
}

/// Build a cache key in the namespace of an entity type.
pub fn build_key_for<T: Typed>(raw_id: &str) -> String {
    build_key(T::TYPE_TAG, raw_id)
}

/// Strip every namespace segment from a key, recovering the raw id.
///
/// Removes everything up to and including the last ':'; a key with no
/// namespace comes back unchanged.
pub fn strip_key_prefixes(key: &str) -> &str {
    match key.rfind(':') {
        Some(idx) => &key[idx + 1..],
        None => key,
    }
}

// ============================================================================
// TESTS
// ============================================================================
