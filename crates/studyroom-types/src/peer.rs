//! Participant identity and session membership.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identifies a participant in a study session.
///
/// Opaque to the replication layer apart from its total order, which leader
/// election relies on. Stable for the life of a connection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(String);

impl PeerId {
    /// Create a peer ID, rejecting the empty string.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::EmptyPeerId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PeerId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PeerId> for String {
    fn from(id: PeerId) -> Self {
        id.0
    }
}

impl std::str::FromStr for PeerId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The set of peers currently known to be in a session, including self.
///
/// Kept ordered so that iteration, and therefore leader election, is
/// independent of the order in which join notifications arrived.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership(BTreeSet<PeerId>);

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a peer. Returns `false` if it was already present.
    pub fn insert(&mut self, peer: PeerId) -> bool {
        self.0.insert(peer)
    }

    /// Remove a peer. Returns `false` if it was not present.
    pub fn remove(&mut self, peer: &PeerId) -> bool {
        self.0.remove(peer)
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.0.contains(peer)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Peers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &PeerId> {
        self.0.iter()
    }

    /// The lexicographically smallest peer, if any.
    pub fn first(&self) -> Option<&PeerId> {
        self.0.first()
    }
}

impl FromIterator<PeerId> for Membership {
    fn from_iter<I: IntoIterator<Item = PeerId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Membership {
    type Item = &'a PeerId;
    type IntoIter = std::collections::btree_set::Iter<'a, PeerId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
