//! Validation errors for values arriving from the wire.

use thiserror::Error;

use crate::timer::TimerMode;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("peer id must not be empty")]
    EmptyPeerId,

    #[error("volume {0} is out of range 0..=100")]
    VolumeOutOfRange(u8),

    #[error("unknown station: {0}")]
    UnknownStation(String),

    #[error("{remaining}s remaining exceeds the {total}s {mode} phase")]
    RemainingOutOfRange {
        remaining: u32,
        total: u32,
        mode: TimerMode,
    },
}
