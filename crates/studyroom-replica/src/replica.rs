//! Apply/broadcast loop shared by every widget.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use studyroom_types::{Body, Domain, Membership, Message, PeerId};
use tracing::{debug, trace};

/// How an accepted snapshot is checked against earlier ones from the same
/// sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotOrdering {
    /// Every accepted message overwrites local state. A redelivered or late
    /// snapshot can roll back newer progress.
    #[default]
    Unconditional,
    /// Discard messages whose `seq` is not above the highest already applied
    /// from that sender.
    PerSenderSequence,
}

/// Outcome of the inbound gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    /// Authored by the local peer.
    SelfEcho,
    /// Belongs to a different widget.
    OtherDomain,
    /// Not newer than what was already applied from this sender.
    Stale { last_applied: u64 },
}

/// Per-widget replication state: identity, outbox and the inbound gate.
#[derive(Debug, Clone)]
pub struct ReplicaCore {
    self_id: PeerId,
    domain: Domain,
    ordering: SnapshotOrdering,
    next_seq: u64,
    outbox: Vec<Message>,
    /// Highest sequence applied per sender, under `PerSenderSequence`.
    applied: HashMap<PeerId, u64>,
}

impl ReplicaCore {
    pub fn new(self_id: PeerId, domain: Domain, ordering: SnapshotOrdering) -> Self {
        Self {
            self_id,
            domain,
            ordering,
            next_seq: 1,
            outbox: Vec::new(),
            applied: HashMap::new(),
        }
    }

    pub fn self_id(&self) -> &PeerId {
        &self.self_id
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn ordering(&self) -> SnapshotOrdering {
        self.ordering
    }

    /// Queue an action for broadcast, stamped with the local identity and the
    /// next sequence number.
    pub fn broadcast(&mut self, body: impl Into<Body>) {
        let msg = Message::new(self.self_id.clone(), self.next_seq, body);
        self.next_seq += 1;
        trace!(domain = %self.domain, action = msg.verb(), seq = msg.seq, "queued");
        self.outbox.push(msg);
    }

    /// Messages queued since the last drain.
    pub fn outbox(&self) -> &[Message] {
        &self.outbox
    }

    pub fn take_outbox(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.outbox)
    }

    /// Decide whether an inbound message may reach the reducer.
    ///
    /// The self-filter comes first and is unconditional: a message carrying
    /// the local identity is never applied, whatever path it arrived by.
    pub fn admit(&mut self, msg: &Message) -> Admission {
        if msg.sender_id == self.self_id {
            return Admission::SelfEcho;
        }
        if msg.domain() != self.domain {
            return Admission::OtherDomain;
        }
        if self.ordering == SnapshotOrdering::PerSenderSequence {
            if let Some(&last_applied) = self.applied.get(&msg.sender_id) {
                if msg.seq <= last_applied {
                    return Admission::Stale { last_applied };
                }
            }
            self.applied.insert(msg.sender_id.clone(), msg.seq);
        }
        Admission::Accept
    }

    /// Drop ordering state for peers that are no longer members, so a peer
    /// that reconnects starts again from sequence 1.
    pub fn forget_departed(&mut self, members: &Membership) {
        self.applied.retain(|peer, _| members.contains(peer));
    }
}

/// A widget replica driven by the shared loop.
///
/// Implementors provide the reducer; the trait supplies the self-filtering
/// inbound path.
pub trait Replica {
    type Action;

    fn core(&self) -> &ReplicaCore;

    fn core_mut(&mut self) -> &mut ReplicaCore;

    /// Extract this widget's action from a body in its domain.
    fn action_of(body: Body) -> Option<Self::Action>;

    /// Merge an accepted remote action into local state.
    fn reduce(&mut self, sender: &PeerId, action: Self::Action);

    /// Handle an inbound message. Returns `true` if it reached the reducer.
    fn on_message(&mut self, msg: Message) -> bool {
        let admission = self.core_mut().admit(&msg);
        if admission != Admission::Accept {
            debug!(
                domain = %self.core().domain(),
                sender = %msg.sender_id,
                action = msg.verb(),
                seq = msg.seq,
                ?admission,
                "message not applied"
            );
            return false;
        }

        let Message {
            sender_id, body, ..
        } = msg;
        match Self::action_of(body) {
            Some(action) => {
                self.reduce(&sender_id, action);
                true
            }
            None => false,
        }
    }

    /// Drain messages queued for broadcast.
    fn take_outbox(&mut self) -> Vec<Message> {
        self.core_mut().take_outbox()
    }
}
