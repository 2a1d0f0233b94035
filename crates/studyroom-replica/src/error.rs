//! Locally rejected widget actions.

use studyroom_types::{PeerId, TimerMode, TimerPhase};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("cannot {action} a {mode} timer that is {phase}")]
    InvalidTransition {
        action: &'static str,
        mode: TimerMode,
        phase: TimerPhase,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("{peer} is not the radio leader")]
    NotLeader {
        peer: PeerId,
        leader: Option<PeerId>,
    },
}
