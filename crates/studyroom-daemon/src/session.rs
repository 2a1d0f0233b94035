//! Relay session: the QUIC-backed broadcast room a peer joins.

use std::net::SocketAddr;

use async_trait::async_trait;
use studyroom_protocol::{
    FrameReceiver, FrameSender, PeerConnection, ProtocolError, QuicTransport, RoomEvent,
    RoomTransport,
};
use studyroom_types::{PeerId, RelayFrame, PROTOCOL_VERSION};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ClientError;

/// A joined relay session.
pub struct RelaySession {
    identity: PeerId,
    session: String,
    connection: PeerConnection,
    tx: FrameSender,
    /// Taken by the reader task on start.
    rx: Option<FrameReceiver>,
    /// Membership reported in `Joined`, delivered as the first event.
    initial_members: Vec<PeerId>,
    reader: Option<JoinHandle<()>>,
    joined: bool,
}

impl RelaySession {
    /// Connect to a relay and join `session` as `identity`.
    pub async fn join(
        transport: &QuicTransport,
        addr: SocketAddr,
        server_name: &str,
        session: &str,
        identity: PeerId,
        token: &str,
    ) -> Result<Self, ClientError> {
        let connection =
            transport
                .connect(addr, server_name)
                .await
                .map_err(|e| match e {
                    ProtocolError::Tls(_) => ClientError::Protocol(e),
                    other => ClientError::Unreachable {
                        addr: addr.to_string(),
                        reason: other.to_string(),
                    },
                })?;
        let (mut tx, mut rx) = connection.open_session_stream().await?;

        tx.send(&RelayFrame::Join {
            version: PROTOCOL_VERSION,
            session: session.to_string(),
            identity: identity.clone(),
            token: token.to_string(),
        })
        .await?;
        debug!(%session, %identity, "sent Join");

        let reply: RelayFrame = rx.recv().await?.ok_or(ProtocolError::StreamClosed)?;
        let members = match reply {
            RelayFrame::Joined { version, members } => {
                verify_version(version)?;
                members
            }
            RelayFrame::Rejected { reason } => {
                connection.close();
                return Err(ClientError::Rejected(reason));
            }
            other => {
                return Err(ProtocolError::Handshake(format!("expected Joined, got {other:?}")).into());
            }
        };

        info!(%session, %identity, members = members.len(), "joined session");
        Ok(Self {
            identity,
            session: session.to_string(),
            connection,
            tx,
            rx: Some(rx),
            initial_members: members,
            reader: None,
            joined: true,
        })
    }

    pub fn session(&self) -> &str {
        &self.session
    }
}

#[async_trait]
impl RoomTransport for RelaySession {
    fn local_id(&self) -> &PeerId {
        &self.identity
    }

    async fn start(&mut self, events: mpsc::Sender<RoomEvent>) -> Result<(), ProtocolError> {
        let mut rx = self
            .rx
            .take()
            .ok_or_else(|| ProtocolError::Other(anyhow::anyhow!("relay session already started")))?;

        events
            .send(RoomEvent::MembersChanged(std::mem::take(
                &mut self.initial_members,
            )))
            .await
            .map_err(|_| ProtocolError::StreamClosed)?;

        self.reader = Some(tokio::spawn(async move {
            let reason = loop {
                let event = match rx.recv::<RelayFrame>().await {
                    Ok(Some(RelayFrame::Deliver { sender, payload })) => RoomEvent::Data {
                        sender,
                        payload: payload.into_bytes(),
                    },
                    Ok(Some(RelayFrame::Members { members })) => RoomEvent::MembersChanged(members),
                    Ok(Some(RelayFrame::Bye)) => break "relay said goodbye".to_string(),
                    Ok(Some(other)) => {
                        debug!(frame = ?other, "ignoring unexpected relay frame");
                        continue;
                    }
                    Ok(None) => break "relay closed the stream".to_string(),
                    Err(e) => break e.to_string(),
                };
                if events.send(event).await.is_err() {
                    return;
                }
            };
            let _ = events.send(RoomEvent::Disconnected { reason }).await;
        }));
        Ok(())
    }

    async fn send(&mut self, payload: Vec<u8>) -> Result<(), ProtocolError> {
        if !self.joined {
            return Err(ProtocolError::NotJoined);
        }
        let payload = String::from_utf8(payload)
            .map_err(|e| ProtocolError::Serialization(format!("payload is not UTF-8: {e}")))?;
        self.tx.send(&RelayFrame::Broadcast { payload }).await
    }

    async fn leave(&mut self) -> Result<(), ProtocolError> {
        if !self.joined {
            return Ok(());
        }
        self.joined = false;

        if let Err(e) = self.tx.send(&RelayFrame::Bye).await {
            warn!(error = %e, "failed to send Bye");
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.connection.close();
        info!(session = %self.session, identity = %self.identity, "left session");
        Ok(())
    }
}

fn verify_version(remote: studyroom_types::ProtocolVersion) -> Result<(), ProtocolError> {
    if !PROTOCOL_VERSION.is_compatible(remote) {
        return Err(ProtocolError::VersionMismatch {
            remote: remote.to_string(),
            local: PROTOCOL_VERSION.to_string(),
        });
    }
    Ok(())
}
