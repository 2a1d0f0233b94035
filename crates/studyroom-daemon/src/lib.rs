//! Runtime for studyroom peers and the relay.
//!
//! A peer runs one [`Client`]: a single task that owns the timer and radio
//! replicas, ticks the timer once a second, feeds room traffic through the
//! codec into the replicas, and drives the media player. The [`Relay`] is the
//! broadcast room peers join over QUIC.

pub mod client;
pub mod config;
pub mod error;
pub mod relay;
pub mod session;
pub mod setup;

pub use client::{Client, ClientEvent, ClientStatus};
pub use config::Config;
pub use error::ClientError;
pub use relay::{Relay, RelayEvent};
pub use session::RelaySession;
