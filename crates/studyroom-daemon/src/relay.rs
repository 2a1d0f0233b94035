//! Relay server: the broadcast room.
//!
//! One task owns every session's membership. Each accepted connection gets
//! its own task that authenticates the `Join`, then forwards `Broadcast`
//! frames to the room task and writes whatever the room task routes back.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use studyroom_auth::TokenVerifier;
use studyroom_protocol::{
    FrameReceiver, FrameSender, PeerConnection, PendingConnection, ProtocolError, QuicTransport,
};
use studyroom_types::{PeerId, RelayFrame, PROTOCOL_VERSION};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ClientError;

/// Frames queued per member before the relay starts dropping.
const MEMBER_QUEUE: usize = 256;

/// How long a refused peer gets to read its `Rejected` frame.
const REJECT_LINGER: Duration = Duration::from_secs(5);

/// Events processed by the relay's main loop.
pub enum RelayEvent {
    /// An authenticated peer wants in.
    Join {
        session: String,
        identity: PeerId,
        conn_id: Uuid,
        outbound: mpsc::Sender<RelayFrame>,
        reply: oneshot::Sender<Result<Vec<PeerId>, String>>,
    },
    /// A member broadcast a payload.
    Broadcast {
        session: String,
        sender: PeerId,
        payload: String,
    },
    /// A member's connection ended.
    Left {
        session: String,
        identity: PeerId,
        conn_id: Uuid,
    },
    /// Shutdown signal.
    Shutdown,
}

struct Member {
    conn_id: Uuid,
    outbound: mpsc::Sender<RelayFrame>,
}

/// The relay server.
pub struct Relay {
    transport: QuicTransport,
    verifier: Arc<TokenVerifier>,
    /// Session name to its members, ordered by identity.
    sessions: HashMap<String, BTreeMap<PeerId, Member>>,
    event_tx: mpsc::Sender<RelayEvent>,
    event_rx: mpsc::Receiver<RelayEvent>,
}

impl Relay {
    pub fn new(transport: QuicTransport, verifier: TokenVerifier) -> Self {
        let (event_tx, event_rx) = mpsc::channel(1024);
        Self {
            transport,
            verifier: Arc::new(verifier),
            sessions: HashMap::new(),
            event_tx,
            event_rx,
        }
    }

    /// Get a clone of the event sender, e.g. for shutting the relay down.
    pub fn event_sender(&self) -> mpsc::Sender<RelayEvent> {
        self.event_tx.clone()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ClientError> {
        Ok(self.transport.local_addr()?)
    }

    /// Run the relay until shut down.
    pub async fn run(&mut self) -> Result<(), ClientError> {
        info!(addr = %self.transport.local_addr()?, "relay running");

        loop {
            tokio::select! {
                result = self.transport.accept_pending() => {
                    match result {
                        Ok(pending) => self.spawn_connection(pending),
                        Err(e) => debug!(error = %e, "accept error"),
                    }
                }
                event = self.event_rx.recv() => {
                    match event {
                        Some(RelayEvent::Join { session, identity, conn_id, outbound, reply }) => {
                            let result = self.handle_join(&session, identity, conn_id, outbound);
                            let _ = reply.send(result);
                        }
                        Some(RelayEvent::Broadcast { session, sender, payload }) => {
                            self.handle_broadcast(&session, &sender, payload);
                        }
                        Some(RelayEvent::Left { session, identity, conn_id }) => {
                            self.handle_left(&session, &identity, conn_id);
                        }
                        Some(RelayEvent::Shutdown) | None => {
                            info!("shutting down");
                            break;
                        }
                    }
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    /// The handshake completes on the connection's own task, so relay events
    /// never cancel it.
    fn spawn_connection(&self, pending: PendingConnection) {
        let verifier = Arc::clone(&self.verifier);
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let remote = pending.remote_address();
            let conn = match pending.establish().await {
                Ok(conn) => conn,
                Err(e) => {
                    debug!(%remote, error = %e, "handshake failed");
                    return;
                }
            };
            if let Err(e) = serve_member(conn.clone(), verifier, event_tx).await {
                debug!(%remote, error = %e, "member connection ended");
            }
            conn.close();
        });
    }

    fn handle_join(
        &mut self,
        session: &str,
        identity: PeerId,
        conn_id: Uuid,
        outbound: mpsc::Sender<RelayFrame>,
    ) -> Result<Vec<PeerId>, String> {
        let members = self.sessions.entry(session.to_string()).or_default();
        if members.contains_key(&identity) {
            warn!(%session, %identity, "duplicate identity rejected");
            return Err(format!("{identity} is already in session {session}"));
        }
        members.insert(identity.clone(), Member { conn_id, outbound });
        info!(%session, %identity, members = members.len(), "member joined");

        let roster: Vec<PeerId> = members.keys().cloned().collect();
        self.announce(session, Some(&identity));
        Ok(roster)
    }

    fn handle_broadcast(&mut self, session: &str, sender: &PeerId, payload: String) {
        let Some(members) = self.sessions.get(session) else {
            return;
        };
        for (identity, member) in members {
            if identity == sender {
                continue;
            }
            let frame = RelayFrame::Deliver {
                sender: sender.clone(),
                payload: payload.clone(),
            };
            if member.outbound.try_send(frame).is_err() {
                warn!(%session, %identity, "member queue full, dropping payload");
            }
        }
    }

    fn handle_left(&mut self, session: &str, identity: &PeerId, conn_id: Uuid) {
        let Some(members) = self.sessions.get_mut(session) else {
            return;
        };
        // Ignore a late leave from a connection this identity no longer uses.
        if members.get(identity).map(|m| m.conn_id) != Some(conn_id) {
            return;
        }
        members.remove(identity);
        info!(%session, %identity, members = members.len(), "member left");

        if members.is_empty() {
            self.sessions.remove(session);
        } else {
            self.announce(session, None);
        }
    }

    /// Tell every member (except `skip`) the current membership.
    fn announce(&self, session: &str, skip: Option<&PeerId>) {
        let Some(members) = self.sessions.get(session) else {
            return;
        };
        let roster: Vec<PeerId> = members.keys().cloned().collect();
        for (identity, member) in members {
            if Some(identity) == skip {
                continue;
            }
            let frame = RelayFrame::Members {
                members: roster.clone(),
            };
            if member.outbound.try_send(frame).is_err() {
                warn!(%session, %identity, "member queue full, dropping membership update");
            }
        }
    }

    fn shutdown(&mut self) {
        for members in self.sessions.values() {
            for member in members.values() {
                let _ = member.outbound.try_send(RelayFrame::Bye);
            }
        }
        self.sessions.clear();
        self.transport.close();
        info!("relay shut down complete");
    }
}

/// Authenticate one member, then pump its frames until it leaves.
async fn serve_member(
    conn: PeerConnection,
    verifier: Arc<TokenVerifier>,
    event_tx: mpsc::Sender<RelayEvent>,
) -> Result<(), ProtocolError> {
    let (tx, mut rx) = conn.accept_session_stream().await?;
    let conn_id = Uuid::new_v4();

    let first: RelayFrame = rx.recv().await?.ok_or(ProtocolError::StreamClosed)?;
    let (version, session, identity, token) = match first {
        RelayFrame::Join {
            version,
            session,
            identity,
            token,
        } => (version, session, identity, token),
        other => {
            return Err(ProtocolError::Handshake(format!("expected Join, got {other:?}")));
        }
    };

    if let Err(reason) = authorize(&verifier, version, &session, &identity, &token) {
        warn!(%conn_id, %session, %identity, %reason, "join refused");
        return reject(tx, rx, reason).await;
    }

    let (outbound_tx, outbound_rx) = mpsc::channel(MEMBER_QUEUE);
    let (reply_tx, reply_rx) = oneshot::channel();
    event_tx
        .send(RelayEvent::Join {
            session: session.clone(),
            identity: identity.clone(),
            conn_id,
            outbound: outbound_tx,
            reply: reply_tx,
        })
        .await
        .map_err(|_| ProtocolError::Connection("relay is shutting down".to_string()))?;

    let members = match reply_rx.await {
        Ok(Ok(members)) => members,
        Ok(Err(reason)) => return reject(tx, rx, reason).await,
        Err(_) => return Err(ProtocolError::Connection("relay is shutting down".to_string())),
    };

    // From here on the room task counts this member, so every exit path
    // must report the leave.
    let result = relay_member(
        tx,
        rx,
        outbound_rx,
        members,
        &session,
        &identity,
        conn_id,
        &event_tx,
    )
    .await;

    let _ = event_tx
        .send(RelayEvent::Left {
            session,
            identity,
            conn_id,
        })
        .await;
    result
}

/// Confirm the join, then pump frames both ways until the member leaves.
#[allow(clippy::too_many_arguments)]
async fn relay_member(
    mut tx: FrameSender,
    mut rx: FrameReceiver,
    mut outbound_rx: mpsc::Receiver<RelayFrame>,
    members: Vec<PeerId>,
    session: &str,
    identity: &PeerId,
    conn_id: Uuid,
    event_tx: &mpsc::Sender<RelayEvent>,
) -> Result<(), ProtocolError> {
    tx.send(&RelayFrame::Joined {
        version: PROTOCOL_VERSION,
        members,
    })
    .await?;
    debug!(%conn_id, %session, %identity, "join accepted");

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let bye = frame == RelayFrame::Bye;
            if tx.send(&frame).await.is_err() || bye {
                break;
            }
        }
        let _ = tx.finish();
    });

    let result = loop {
        match rx.recv::<RelayFrame>().await {
            Ok(Some(RelayFrame::Broadcast { payload })) => {
                let event = RelayEvent::Broadcast {
                    session: session.to_string(),
                    sender: identity.clone(),
                    payload,
                };
                if event_tx.send(event).await.is_err() {
                    break Ok(());
                }
            }
            Ok(Some(RelayFrame::Bye) | None) => break Ok(()),
            Ok(Some(other)) => debug!(%identity, frame = ?other, "ignoring unexpected frame"),
            Err(e) => break Err(e),
        }
    };

    writer.abort();
    result
}

/// Send `Rejected` and wait for the peer to hang up, so the frame is not lost
/// when the connection closes.
async fn reject(
    mut tx: FrameSender,
    mut rx: FrameReceiver,
    reason: String,
) -> Result<(), ProtocolError> {
    tx.send(&RelayFrame::Rejected { reason }).await?;
    let _ = tx.finish();
    let _ = tokio::time::timeout(REJECT_LINGER, rx.recv::<RelayFrame>()).await;
    Ok(())
}

fn authorize(
    verifier: &TokenVerifier,
    version: studyroom_types::ProtocolVersion,
    session: &str,
    identity: &PeerId,
    token: &str,
) -> Result<(), String> {
    if !PROTOCOL_VERSION.is_compatible(version) {
        return Err(format!(
            "incompatible protocol version {version}, relay speaks {PROTOCOL_VERSION}"
        ));
    }
    let claims = verifier.verify(token).map_err(|e| e.to_string())?;
    if claims.sub != identity.as_str() || claims.room != session {
        return Err("token was issued for a different participant or session".to_string());
    }
    if !claims.grants.can_publish_data {
        return Err("token does not allow publishing".to_string());
    }
    Ok(())
}
