//! QUIC connection and relay frame streams.

use std::net::SocketAddr;

use quinn::{Connection, RecvStream, SendStream};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::error::ProtocolError;
use crate::wire::{self, MAX_FRAME_SIZE};

/// A QUIC connection between a peer and the relay.
#[derive(Clone)]
pub struct PeerConnection {
    connection: Connection,
}

impl PeerConnection {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Get the remote address of this connection.
    pub fn remote_address(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    /// Open the bidirectional session stream (peer side).
    pub async fn open_session_stream(&self) -> Result<(FrameSender, FrameReceiver), ProtocolError> {
        let (send, recv) = self
            .connection
            .open_bi()
            .await
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;
        Ok((FrameSender::new(send), FrameReceiver::new(recv)))
    }

    /// Accept the bidirectional session stream (relay side).
    pub async fn accept_session_stream(
        &self,
    ) -> Result<(FrameSender, FrameReceiver), ProtocolError> {
        let (send, recv) = self
            .connection
            .accept_bi()
            .await
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;
        Ok((FrameSender::new(send), FrameReceiver::new(recv)))
    }

    /// Close the connection gracefully.
    pub fn close(&self) {
        self.connection.close(quinn::VarInt::from_u32(0), b"bye");
    }
}

/// Writes length-prefixed JSON frames to a QUIC send stream.
pub struct FrameSender {
    stream: SendStream,
}

impl FrameSender {
    fn new(stream: SendStream) -> Self {
        Self { stream }
    }

    pub async fn send<T: Serialize>(&mut self, frame: &T) -> Result<(), ProtocolError> {
        let buf = wire::encode_frame(frame)?;
        self.stream
            .write_all(&buf)
            .await
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;

        trace!(len = buf.len() - 4, "sent frame");
        Ok(())
    }

    /// Finish the stream (signal no more data).
    pub fn finish(mut self) -> Result<(), ProtocolError> {
        self.stream
            .finish()
            .map_err(|e| ProtocolError::Connection(e.to_string()))
    }
}

/// Reads length-prefixed JSON frames from a QUIC recv stream.
pub struct FrameReceiver {
    stream: RecvStream,
}

impl FrameReceiver {
    fn new(stream: RecvStream) -> Self {
        Self { stream }
    }

    /// Receive and decode a frame.
    ///
    /// Returns `None` if the stream has been cleanly closed by the other side.
    pub async fn recv<T: DeserializeOwned>(&mut self) -> Result<Option<T>, ProtocolError> {
        let mut len_buf = [0u8; 4];
        match self.stream.read_exact(&mut len_buf).await {
            Ok(()) => {}
            Err(quinn::ReadExactError::FinishedEarly(_)) => return Ok(None),
            Err(quinn::ReadExactError::ReadError(e)) => {
                return Err(ProtocolError::Connection(e.to_string()));
            }
        }

        let len = u32::from_be_bytes(len_buf);
        if len > MAX_FRAME_SIZE {
            return Err(ProtocolError::Deserialization(format!(
                "frame size {len} exceeds maximum {MAX_FRAME_SIZE}"
            )));
        }

        let mut payload = vec![0u8; len as usize];
        match self.stream.read_exact(&mut payload).await {
            Ok(()) => {}
            Err(quinn::ReadExactError::FinishedEarly(_)) => {
                return Err(ProtocolError::StreamClosed);
            }
            Err(quinn::ReadExactError::ReadError(e)) => {
                return Err(ProtocolError::Connection(e.to_string()));
            }
        }

        let frame = wire::decode_frame(&payload)?;
        trace!(len, "received frame");
        Ok(Some(frame))
    }
}
