//! Credential and certificate errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("credential issuer misconfigured: {0}")]
    Misconfigured(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    Expired,

    #[error("certificate generation failed: {0}")]
    Certificate(String),
}

impl AuthError {
    /// What the user can do about it.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "provide both a session name and a participant name",
            Self::Misconfigured(_) => {
                "set api_key, api_secret and endpoint_url under [credentials] in config.toml and restart"
            }
            Self::InvalidToken(_) | Self::Expired => {
                "request a fresh token for this session and participant"
            }
            Self::Certificate(_) => {
                "check that the config directory is writable, or run `studyroom generate-cert`"
            }
        }
    }
}
