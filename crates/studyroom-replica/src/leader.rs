//! Leader election.
//!
//! The leader is the lexicographically smallest peer in the membership. It is
//! a pure function of the membership set, so any two peers that see the same
//! set agree. Peers that momentarily see different sets (during near
//! simultaneous joins and leaves) may disagree until membership settles; that
//! window is not masked here.

use studyroom_types::{Membership, PeerId};
use tracing::info;

/// Elect the leader of a membership set.
pub fn elect_leader(members: &Membership) -> Option<&PeerId> {
    members.first()
}

/// One peer's view of membership and the leader derived from it.
#[derive(Debug, Clone)]
pub struct LeaderView {
    self_id: PeerId,
    members: Membership,
    leader: Option<PeerId>,
}

impl LeaderView {
    /// A view with no known membership yet, and therefore no leader.
    pub fn new(self_id: PeerId) -> Self {
        Self {
            self_id,
            members: Membership::new(),
            leader: None,
        }
    }

    /// Replace the membership and recompute the leader.
    ///
    /// The local peer is always counted as a member. Returns `true` if the
    /// leader changed.
    pub fn update(&mut self, members: impl IntoIterator<Item = PeerId>) -> bool {
        let mut members: Membership = members.into_iter().collect();
        members.insert(self.self_id.clone());

        let leader = elect_leader(&members).cloned();
        let changed = leader != self.leader;
        if changed {
            info!(
                previous = ?self.leader.as_ref().map(PeerId::as_str),
                leader = ?leader.as_ref().map(PeerId::as_str),
                members = members.len(),
                "radio leader changed"
            );
        }
        self.members = members;
        self.leader = leader;
        changed
    }

    pub fn self_id(&self) -> &PeerId {
        &self.self_id
    }

    pub fn leader(&self) -> Option<&PeerId> {
        self.leader.as_ref()
    }

    pub fn members(&self) -> &Membership {
        &self.members
    }

    pub fn is_leader(&self) -> bool {
        self.leader.as_ref() == Some(&self.self_id)
    }
}
