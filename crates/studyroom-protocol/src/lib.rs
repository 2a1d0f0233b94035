//! Message codec, relay transport and room abstraction for studyroom.
//!
//! This crate turns replication [`Message`](studyroom_types::Message)s into
//! UTF-8 JSON text records and back, frames relay traffic over QUIC streams
//! (via quinn), and defines the [`RoomTransport`] trait the client event loop
//! drives. An in-memory [`loopback`] hub is available behind the `mock`
//! feature for tests.

pub mod connection;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod loopback;
pub mod room;
pub mod tls;
pub mod transport;
pub mod wire;

pub use connection::{FrameReceiver, FrameSender, PeerConnection};
pub use error::ProtocolError;
pub use room::{RoomEvent, RoomTransport};
pub use transport::{PendingConnection, QuicTransport};
