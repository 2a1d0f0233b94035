//! QUIC transport: bind, accept, and connect.

use std::net::SocketAddr;

use quinn::Endpoint;
use tracing::{debug, info};

use crate::connection::PeerConnection;
use crate::error::ProtocolError;
use crate::tls;

/// QUIC endpoint shared by the relay (server role) and peers (client role).
#[derive(Clone)]
pub struct QuicTransport {
    endpoint: Endpoint,
}

impl QuicTransport {
    /// Bind a relay endpoint that accepts peer connections.
    pub fn bind(addr: SocketAddr, cert_pem: &str, key_pem: &str) -> Result<Self, ProtocolError> {
        install_crypto_provider();

        let server_config = tls::server_config(cert_pem, key_pem)?;
        let endpoint = Endpoint::server(server_config, addr)
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;

        info!(addr = %addr, "relay transport bound");
        Ok(Self { endpoint })
    }

    /// Create a client-only endpoint for connecting to a relay.
    pub fn client(pinned_fingerprint: Option<&str>) -> Result<Self, ProtocolError> {
        install_crypto_provider();

        let bind: SocketAddr = SocketAddr::from(([0, 0, 0, 0], 0));
        let mut endpoint =
            Endpoint::client(bind).map_err(|e| ProtocolError::Connection(e.to_string()))?;
        endpoint.set_default_client_config(tls::client_config(pinned_fingerprint)?);

        debug!("client transport ready");
        Ok(Self { endpoint })
    }

    /// Wait for the next connection attempt without completing its
    /// handshake. Safe to cancel: no attempt is lost.
    pub async fn accept_pending(&self) -> Result<PendingConnection, ProtocolError> {
        let incoming = self
            .endpoint
            .accept()
            .await
            .ok_or_else(|| ProtocolError::Connection("endpoint closed".to_string()))?;
        Ok(PendingConnection { incoming })
    }

    /// Accept an incoming connection and complete its handshake.
    pub async fn accept(&self) -> Result<PeerConnection, ProtocolError> {
        self.accept_pending().await?.establish().await
    }

    /// Connect to a relay.
    pub async fn connect(
        &self,
        addr: SocketAddr,
        server_name: &str,
    ) -> Result<PeerConnection, ProtocolError> {
        let connection = self
            .endpoint
            .connect(addr, server_name)
            .map_err(|e| ProtocolError::Connection(e.to_string()))?
            .await
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;

        debug!(remote = %addr, "connected to relay");
        Ok(PeerConnection::new(connection))
    }

    /// Get the local address this transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ProtocolError> {
        self.endpoint
            .local_addr()
            .map_err(|e| ProtocolError::Connection(e.to_string()))
    }

    /// Gracefully shut down the transport.
    pub fn close(&self) {
        self.endpoint.close(quinn::VarInt::from_u32(0), b"shutdown");
        info!("QUIC transport closed");
    }
}

/// A connection attempt whose handshake is still in flight.
pub struct PendingConnection {
    incoming: quinn::Incoming,
}

impl PendingConnection {
    pub fn remote_address(&self) -> SocketAddr {
        self.incoming.remote_address()
    }

    /// Finish the handshake.
    pub async fn establish(self) -> Result<PeerConnection, ProtocolError> {
        let connection = self
            .incoming
            .await
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;

        let remote = connection.remote_address();
        debug!(remote = %remote, "accepted connection");
        Ok(PeerConnection::new(connection))
    }
}

fn install_crypto_provider() {
    // Fails harmlessly if a provider is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();
}
