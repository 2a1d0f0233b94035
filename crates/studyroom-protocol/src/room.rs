//! Broadcast room abstraction.
//!
//! A room delivers opaque payloads to every other member of a session and
//! reports membership changes. Delivery is best effort and ordered per
//! sender only.

use async_trait::async_trait;
use studyroom_types::PeerId;
use tokio::sync::mpsc;

use crate::error::ProtocolError;

/// Something that happened in the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// A payload broadcast by another member.
    Data { sender: PeerId, payload: Vec<u8> },
    /// Current membership, including the local peer.
    MembersChanged(Vec<PeerId>),
    /// The room is gone; no further events follow.
    Disconnected { reason: String },
}

/// Broadcast transport consumed by the client event loop.
#[async_trait]
pub trait RoomTransport: Send + 'static {
    /// The identity this transport joined as.
    fn local_id(&self) -> &PeerId;

    /// Start delivering room events to `tx`.
    ///
    /// The current membership is delivered as the first event.
    async fn start(&mut self, tx: mpsc::Sender<RoomEvent>) -> Result<(), ProtocolError>;

    /// Broadcast a payload to all other members. Never delivered back to self.
    async fn send(&mut self, payload: Vec<u8>) -> Result<(), ProtocolError>;

    /// Leave the room. Events stop after this returns.
    async fn leave(&mut self) -> Result<(), ProtocolError>;
}
