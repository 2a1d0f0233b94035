//! Client and relay errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("credentials unavailable: {0}")]
    Credentials(#[from] studyroom_auth::AuthError),

    #[error("cannot reach relay at {addr}: {reason}")]
    Unreachable { addr: String, reason: String },

    #[error("relay refused to join: {0}")]
    Rejected(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] studyroom_protocol::ProtocolError),

    #[error("media error: {0}")]
    Media(#[from] studyroom_media::MediaError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    /// What the user can do about it.
    pub fn hint(&self) -> String {
        match self {
            Self::Config(_) => "check the config file syntax and values".to_string(),
            Self::Credentials(e) => e.hint().to_string(),
            Self::Unreachable { addr, .. } => format!(
                "make sure a relay is running at {addr} (`studyroom relay`) \
                 and that [session] relay points at it"
            ),
            Self::Rejected(_) => "the token may be expired or issued for another session, \
                 or the participant name is already in use"
                .to_string(),
            Self::Protocol(studyroom_protocol::ProtocolError::VersionMismatch { .. }) => {
                "upgrade the peer or relay so both speak the same protocol version".to_string()
            }
            Self::Protocol(studyroom_protocol::ProtocolError::Tls(_)) => {
                "the relay certificate does not match [session] fingerprint".to_string()
            }
            Self::Protocol(_) | Self::Media(_) | Self::Other(_) => {
                "run with RUST_LOG=debug for details".to_string()
            }
        }
    }
}
