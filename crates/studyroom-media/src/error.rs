//! Playback errors.

use studyroom_types::StationId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("stream for {station} is unreachable: {reason}")]
    StreamUnreachable { station: StationId, reason: String },

    #[error("player has been shut down")]
    ShutDown,

    #[error("backend not available on this platform")]
    Unavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
