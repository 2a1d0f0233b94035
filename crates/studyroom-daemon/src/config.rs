//! Peer and relay configuration loaded from TOML.

use serde::{Deserialize, Serialize};
use studyroom_replica::SnapshotOrdering;
use uuid::Uuid;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub replication: ReplicationConfig,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// Participant identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Participant name, used as the peer id. Must be unique in a session.
    #[serde(default = "default_name")]
    pub name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
        }
    }
}

/// Which session to join and where.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_name")]
    pub name: String,
    /// Relay address (`host:port`). Overrides the endpoint returned with the
    /// credentials.
    #[serde(default)]
    pub relay: Option<String>,
    /// Name the relay certificate is checked against.
    #[serde(default = "default_server_name")]
    pub server_name: String,
    /// Pinned relay certificate fingerprint (`SHA256:aa:bb:...`).
    #[serde(default)]
    pub fingerprint: Option<String>,
    /// Pre-issued join token. When set, no token is minted locally.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: default_session_name(),
            relay: None,
            server_name: default_server_name(),
            fingerprint: None,
            token: None,
        }
    }
}

/// Relay listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Shared API credentials for minting and checking join tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    /// Relay address handed out with every token.
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            endpoint_url: default_endpoint_url(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplicationConfig {
    #[serde(default)]
    pub snapshot_ordering: SnapshotOrdering,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_name() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "studyroom".to_string());
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{host}-{}", &suffix[..4])
}

fn default_session_name() -> String {
    "study-hall".to_string()
}

fn default_server_name() -> String {
    "localhost".to_string()
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    24900
}

fn default_endpoint_url() -> String {
    format!("127.0.0.1:{}", default_port())
}

fn default_token_ttl_secs() -> u64 {
    6 * 60 * 60
}
