//! Session join tokens.
//!
//! A token is `base64url(claims) "." base64url(HMAC-SHA256(secret, claims))`.
//! The issuer and the relay share the API secret; peers treat tokens as
//! opaque strings.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ring::hmac;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;

/// What a token holder may do in its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grants {
    pub room_join: bool,
    pub can_publish_data: bool,
    pub can_subscribe: bool,
}

impl Default for Grants {
    fn default() -> Self {
        Self {
            room_join: true,
            can_publish_data: true,
            can_subscribe: true,
        }
    }
}

/// Signed token contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// API key of the issuer.
    pub iss: String,
    /// Participant identity.
    pub sub: String,
    /// Session name.
    pub room: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: u64,
    pub grants: Grants,
}

/// Result of a successful credential request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    /// Relay address, `host:port`.
    pub endpoint_url: String,
}

/// Where a peer gets its credentials from at connect time.
pub trait CredentialSource: Send + Sync {
    fn credentials(&self, session: &str, participant: &str) -> Result<Credentials, AuthError>;
}

/// Mints tokens with the shared API secret.
pub struct CredentialIssuer {
    api_key: String,
    key: hmac::Key,
    endpoint_url: String,
    ttl: Duration,
}

impl std::fmt::Debug for CredentialIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialIssuer")
            .field("api_key", &self.api_key)
            .field("endpoint_url", &self.endpoint_url)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CredentialIssuer {
    pub fn new(
        api_key: &str,
        api_secret: &str,
        endpoint_url: &str,
        ttl: Duration,
    ) -> Result<Self, AuthError> {
        if api_key.is_empty() || api_secret.is_empty() {
            return Err(AuthError::Misconfigured(
                "missing API key or secret".to_string(),
            ));
        }
        if endpoint_url.is_empty() {
            return Err(AuthError::Misconfigured(
                "missing relay endpoint URL".to_string(),
            ));
        }
        Ok(Self {
            api_key: api_key.to_string(),
            key: hmac::Key::new(hmac::HMAC_SHA256, api_secret.as_bytes()),
            endpoint_url: endpoint_url.to_string(),
            ttl,
        })
    }

    /// Issue credentials valid from `now` for the configured TTL.
    pub fn issue_at(
        &self,
        session: &str,
        participant: &str,
        now: SystemTime,
    ) -> Result<Credentials, AuthError> {
        if session.is_empty() {
            return Err(AuthError::MissingField("session name"));
        }
        if participant.is_empty() {
            return Err(AuthError::MissingField("participant name"));
        }

        let claims = Claims {
            iss: self.api_key.clone(),
            sub: participant.to_string(),
            room: session.to_string(),
            exp: unix_seconds(now).saturating_add(self.ttl.as_secs()),
            grants: Grants::default(),
        };
        let token = sign(&self.key, &claims)?;
        debug!(session, participant, exp = claims.exp, "issued token");

        Ok(Credentials {
            token,
            endpoint_url: self.endpoint_url.clone(),
        })
    }
}

impl CredentialSource for CredentialIssuer {
    fn credentials(&self, session: &str, participant: &str) -> Result<Credentials, AuthError> {
        self.issue_at(session, participant, SystemTime::now())
    }
}

/// Credentials handed out of band, e.g. on the command line.
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl CredentialSource for StaticCredentials {
    fn credentials(&self, session: &str, participant: &str) -> Result<Credentials, AuthError> {
        if session.is_empty() {
            return Err(AuthError::MissingField("session name"));
        }
        if participant.is_empty() {
            return Err(AuthError::MissingField("participant name"));
        }
        if self.0.token.is_empty() {
            return Err(AuthError::MissingField("token"));
        }
        Ok(self.0.clone())
    }
}

/// Checks tokens on the relay side.
pub struct TokenVerifier {
    api_key: String,
    key: hmac::Key,
}

impl TokenVerifier {
    pub fn new(api_key: &str, api_secret: &str) -> Result<Self, AuthError> {
        if api_key.is_empty() || api_secret.is_empty() {
            return Err(AuthError::Misconfigured(
                "missing API key or secret".to_string(),
            ));
        }
        Ok(Self {
            api_key: api_key.to_string(),
            key: hmac::Key::new(hmac::HMAC_SHA256, api_secret.as_bytes()),
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, SystemTime::now())
    }

    /// Verify signature, issuer, join grant and expiry as of `now`.
    pub fn verify_at(&self, token: &str, now: SystemTime) -> Result<Claims, AuthError> {
        let (body, signature) = token
            .split_once('.')
            .ok_or_else(|| AuthError::InvalidToken("expected two segments".to_string()))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| AuthError::InvalidToken(format!("bad signature encoding: {e}")))?;
        hmac::verify(&self.key, body.as_bytes(), &signature)
            .map_err(|_| AuthError::InvalidToken("signature mismatch".to_string()))?;

        let json = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| AuthError::InvalidToken(format!("bad claims encoding: {e}")))?;
        let claims: Claims = serde_json::from_slice(&json)
            .map_err(|e| AuthError::InvalidToken(format!("bad claims: {e}")))?;

        if claims.iss != self.api_key {
            return Err(AuthError::InvalidToken(format!(
                "unknown issuer {}",
                claims.iss
            )));
        }
        if !claims.grants.room_join {
            return Err(AuthError::InvalidToken("token does not grant join".to_string()));
        }
        if unix_seconds(now) >= claims.exp {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }
}

fn sign(key: &hmac::Key, claims: &Claims) -> Result<String, AuthError> {
    let json = serde_json::to_vec(claims)
        .map_err(|e| AuthError::InvalidToken(format!("cannot encode claims: {e}")))?;
    let body = URL_SAFE_NO_PAD.encode(json);
    let tag = hmac::sign(key, body.as_bytes());
    Ok(format!("{body}.{}", URL_SAFE_NO_PAD.encode(tag.as_ref())))
}

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
