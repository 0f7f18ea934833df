//! Lazy cross-document links.
//!
//! An [`ObjectLink`] stores the id of a related document instead of
//! embedding the document itself. The target is fetched on first
//! [`resolve`] and memoized in memory, so repeated access costs nothing
//! after the first hit. Only the id (and an optional display hint) is
//! serialized; the resolved value never travels with the owning document.
//!
//! [`resolve`]: ObjectLink::resolve

use serde::{Deserialize, Serialize};
use stratum_core::entity::{Entity, Identified};
use stratum_core::key::strip_key_prefixes;
use stratum_core::StratumResult;

use crate::resolver::Resolver;

/// Resolution state of a link. Transitions from Unresolved to Resolved at
/// most once per in-memory instance; a resolver miss leaves it Unresolved
/// so a later call can retry.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkState<T> {
    Unresolved,
    Resolved(T),
}

impl<T> Default for LinkState<T> {
    fn default() -> Self {
        Self::Unresolved
    }
}

/// Reference to another document, resolved lazily.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectLink<T> {
    /// Id of the linked document, stored without namespace prefixes.
    pub link: String,
    /// Display hint (a name or title) usable without resolving the link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip, default = "LinkState::default")]
    state: LinkState<T>,
}

impl<T> Default for ObjectLink<T> {
    fn default() -> Self {
        Self {
            link: String::new(),
            identifier: None,
            state: LinkState::Unresolved,
        }
    }
}

impl<T: Entity> ObjectLink<T> {
    /// Link to an entity already in hand. The link starts Resolved, so no
    /// fetch happens until the value is dropped from memory by
    /// reserialization.
    pub fn from_entity(value: T) -> Self {
        let link = strip_key_prefixes(value.id()).to_string();
        Self {
            link,
            identifier: None,
            state: LinkState::Resolved(value),
        }
    }

    /// Link to a document by id. Namespace prefixes are stripped so cache
    /// keys can be passed as ids.
    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            link: strip_key_prefixes(&id).to_string(),
            identifier: None,
            state: LinkState::Unresolved,
        }
    }

    /// Attach a display hint.
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Whether the link points at anything.
    pub fn has_link(&self) -> bool {
        !self.link.is_empty()
    }

    /// Whether the target is already in memory.
    pub fn is_resolved(&self) -> bool {
        matches!(self.state, LinkState::Resolved(_))
    }

    /// The resolved target, if resolution already happened.
    pub fn value(&self) -> Option<&T> {
        match &self.state {
            LinkState::Resolved(value) => Some(value),
            LinkState::Unresolved => None,
        }
    }

    /// Resolve the link through the given resolver.
    ///
    /// An already-resolved link returns immediately without I/O. An empty
    /// link resolves to None without consulting the resolver. Otherwise the
    /// resolver is asked once; a hit is memoized for every later call,
    /// while a miss leaves the link Unresolved so the next call retries.
    pub async fn resolve<R: Resolver>(&mut self, resolver: &R) -> StratumResult<Option<&T>> {
        if !self.is_resolved() {
            if !self.has_link() {
                return Ok(None);
            }
            if let Some(value) = resolver.resolve::<T>(&self.link).await? {
                self.state = LinkState::Resolved(value);
            }
        }
        Ok(self.value())
    }
}
