//! Shared types for studyroom.
//!
//! This crate contains all types shared across the studyroom workspace:
//! participant identity, session membership, the replicated widget state
//! (timer and radio), the action records peers exchange, and the frames
//! spoken between a peer and the relay.

pub mod error;
pub mod message;
pub mod peer;
pub mod radio;
pub mod relay;
pub mod timer;

pub use error::ValidationError;
pub use message::{Body, Domain, Message, RadioAction, TimerAction};
pub use peer::{Membership, PeerId};
pub use radio::{RadioState, Station, StationId, Volume, STATIONS};
pub use relay::{ProtocolVersion, RelayFrame, PROTOCOL_VERSION};
pub use timer::{
    TimerMode, TimerPhase, TimerState, CYCLES_PER_LONG_BREAK, LONG_BREAK_SECONDS,
    POMODORO_SECONDS, SHORT_BREAK_SECONDS, SYNC_INTERVAL_SECONDS,
};
