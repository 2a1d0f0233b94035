//! In-memory broadcast room for tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use studyroom_types::PeerId;
use tokio::sync::mpsc;

use crate::error::ProtocolError;
use crate::room::{RoomEvent, RoomTransport};

#[derive(Default)]
struct HubState {
    members: BTreeMap<PeerId, mpsc::Sender<RoomEvent>>,
    /// Every payload broadcast through the hub, in order.
    sent: Vec<(PeerId, Vec<u8>)>,
}

/// A shared in-memory room. Clone it to hand the same room to several peers.
#[derive(Clone, Default)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport for `peer`. The peer joins when the transport is started.
    pub fn room(&self, peer: PeerId) -> LoopbackRoom {
        LoopbackRoom {
            id: peer,
            hub: self.clone(),
            joined: false,
        }
    }

    /// Currently joined peers, in ascending order.
    pub fn members(&self) -> Vec<PeerId> {
        self.lock().members.keys().cloned().collect()
    }

    /// Every payload broadcast so far with its sender.
    pub fn sent(&self) -> Vec<(PeerId, Vec<u8>)> {
        self.lock().sent.clone()
    }

    /// Deliver a payload as if `sender` had broadcast it.
    pub async fn inject(&self, sender: &PeerId, payload: Vec<u8>) {
        let targets = {
            let mut state = self.lock();
            state.sent.push((sender.clone(), payload.clone()));
            state
                .members
                .iter()
                .filter(|(id, _)| *id != sender)
                .map(|(_, tx)| tx.clone())
                .collect::<Vec<_>>()
        };
        for tx in targets {
            let _ = tx
                .send(RoomEvent::Data {
                    sender: sender.clone(),
                    payload: payload.clone(),
                })
                .await;
        }
    }

    /// Drop a peer without it leaving, as a crashed connection would.
    pub async fn disconnect(&self, peer: &PeerId) {
        let removed = self.lock().members.remove(peer);
        if let Some(tx) = removed {
            let _ = tx
                .send(RoomEvent::Disconnected {
                    reason: "dropped by hub".to_string(),
                })
                .await;
        }
        self.announce().await;
    }

    async fn announce(&self) {
        let (members, targets) = {
            let state = self.lock();
            let members: Vec<PeerId> = state.members.keys().cloned().collect();
            let targets: Vec<_> = state.members.values().cloned().collect();
            (members, targets)
        };
        for tx in targets {
            let _ = tx.send(RoomEvent::MembersChanged(members.clone())).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One peer's view of a [`LoopbackHub`].
pub struct LoopbackRoom {
    id: PeerId,
    hub: LoopbackHub,
    joined: bool,
}

#[async_trait]
impl RoomTransport for LoopbackRoom {
    fn local_id(&self) -> &PeerId {
        &self.id
    }

    async fn start(&mut self, tx: mpsc::Sender<RoomEvent>) -> Result<(), ProtocolError> {
        self.hub.lock().members.insert(self.id.clone(), tx);
        self.joined = true;
        self.hub.announce().await;
        Ok(())
    }

    async fn send(&mut self, payload: Vec<u8>) -> Result<(), ProtocolError> {
        if !self.joined || !self.hub.lock().members.contains_key(&self.id) {
            return Err(ProtocolError::NotJoined);
        }
        self.hub.inject(&self.id, payload).await;
        Ok(())
    }

    async fn leave(&mut self) -> Result<(), ProtocolError> {
        if self.joined {
            self.joined = false;
            self.hub.lock().members.remove(&self.id);
            self.hub.announce().await;
        }
        Ok(())
    }
}
