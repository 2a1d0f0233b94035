//! Replicated widget state for studyroom.
//!
//! Each peer keeps its own replica of every widget and converges with the
//! others purely by exchanging [`Message`](studyroom_types::Message)s. This
//! crate holds the state machines only: no I/O, no clocks. The host feeds in
//! ticks, inbound messages and membership changes, and drains the outbox
//! (and, for the radio, the media effects) after every event.

pub mod error;
pub mod leader;
pub mod radio;
pub mod replica;
pub mod timer;

pub use error::{RadioError, TimerError};
pub use leader::{elect_leader, LeaderView};
pub use radio::{MediaEffect, RadioCommand, RadioReplica};
pub use replica::{Admission, Replica, ReplicaCore, SnapshotOrdering};
pub use timer::{TimerCommand, TimerEvent, TimerReplica};
