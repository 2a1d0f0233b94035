//! Frames exchanged between a peer and the relay.
//!
//! The relay only routes: it never looks inside `payload`, which carries an
//! encoded [`Message`](crate::Message).

use serde::{Deserialize, Serialize};

use crate::peer::PeerId;

/// Current relay protocol version.
pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion { major: 0, minor: 1 };

/// Protocol version for compatibility negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u16,
    pub minor: u16,
}

impl ProtocolVersion {
    /// Peers with the same major version can talk to each other.
    pub fn is_compatible(self, other: ProtocolVersion) -> bool {
        self.major == other.major
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RelayFrame {
    /// First frame from a connecting peer.
    Join {
        version: ProtocolVersion,
        session: String,
        identity: PeerId,
        token: String,
    },

    /// Join accepted. `members` includes the joining peer.
    Joined {
        version: ProtocolVersion,
        members: Vec<PeerId>,
    },

    /// Join refused; the relay closes the stream afterwards.
    Rejected { reason: String },

    /// Peer to relay: deliver to every other member of the session.
    Broadcast { payload: String },

    /// Relay to peer: a payload broadcast by another member.
    Deliver { sender: PeerId, payload: String },

    /// Relay to peer: membership changed.
    Members { members: Vec<PeerId> },

    /// Graceful leave.
    Bye,
}
