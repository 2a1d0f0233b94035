//! Config loading, relay certificates, credentials and connecting.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use studyroom_auth::{
    CredentialIssuer, CredentialSource, Credentials, GeneratedCert, StaticCredentials,
    TokenVerifier,
};
use studyroom_protocol::QuicTransport;
use studyroom_types::PeerId;
use tracing::info;

use crate::config::Config;
use crate::error::ClientError;
use crate::session::RelaySession;

/// Load configuration from the given path, or the default location.
pub fn load_config(path: Option<&str>) -> Result<Config, ClientError> {
    let config_path = match path {
        Some(p) => PathBuf::from(p),
        None => default_config_path(),
    };

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ClientError::Config(format!("failed to read config: {e}")))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ClientError::Config(format!("failed to parse config: {e}")))?;
        info!(path = %config_path.display(), "loaded config");
        Ok(config)
    } else {
        info!("no config file found, using defaults");
        Ok(Config::default())
    }
}

/// Load the relay's TLS cert and key from the config directory, or generate
/// them if missing.
pub fn load_or_generate_certs(config_dir: &Path) -> Result<(String, String), ClientError> {
    let cert_path = config_dir.join("relay.crt");
    let key_path = config_dir.join("relay.key");

    if cert_path.exists() && key_path.exists() {
        let cert_pem = std::fs::read_to_string(&cert_path)
            .map_err(|e| ClientError::Config(format!("failed to read cert: {e}")))?;
        let key_pem = std::fs::read_to_string(&key_path)
            .map_err(|e| ClientError::Config(format!("failed to read key: {e}")))?;
        info!(path = %cert_path.display(), "loaded existing TLS cert");
        Ok((cert_pem, key_pem))
    } else {
        std::fs::create_dir_all(config_dir)
            .map_err(|e| ClientError::Config(format!("failed to create config dir: {e}")))?;

        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "studyroom".to_string());

        let GeneratedCert {
            cert_pem,
            key_pem,
            fingerprint,
        } = studyroom_auth::generate_certificate(&hostname)?;

        std::fs::write(&cert_path, &cert_pem)
            .map_err(|e| ClientError::Config(format!("failed to write cert: {e}")))?;
        std::fs::write(&key_path, &key_pem)
            .map_err(|e| ClientError::Config(format!("failed to write key: {e}")))?;

        info!(fingerprint = %fingerprint, "generated new TLS cert");
        Ok((cert_pem, key_pem))
    }
}

/// Where this peer gets its join credentials from.
///
/// A pre-issued `[session] token` wins; otherwise tokens are minted locally
/// with the `[credentials]` API secret.
pub fn credential_source(config: &Config) -> Result<Box<dyn CredentialSource>, ClientError> {
    if let Some(token) = &config.session.token {
        let endpoint_url = config
            .session
            .relay
            .clone()
            .unwrap_or_else(|| config.credentials.endpoint_url.clone());
        return Ok(Box::new(StaticCredentials(Credentials {
            token: token.clone(),
            endpoint_url,
        })));
    }

    let creds = &config.credentials;
    let issuer = CredentialIssuer::new(
        &creds.api_key,
        &creds.api_secret,
        &creds.endpoint_url,
        Duration::from_secs(creds.token_ttl_secs),
    )?;
    Ok(Box::new(issuer))
}

/// Token verifier for the relay.
pub fn token_verifier(config: &Config) -> Result<TokenVerifier, ClientError> {
    Ok(TokenVerifier::new(
        &config.credentials.api_key,
        &config.credentials.api_secret,
    )?)
}

/// Fetch credentials and join the configured session.
///
/// Runs once. Every failure here is terminal for the session.
pub async fn connect(
    config: &Config,
    source: &dyn CredentialSource,
) -> Result<RelaySession, ClientError> {
    let identity = PeerId::new(config.identity.name.clone())
        .map_err(|e| ClientError::Config(format!("invalid [identity] name: {e}")))?;

    let credentials = source.credentials(&config.session.name, identity.as_str())?;
    let endpoint = config
        .session
        .relay
        .clone()
        .unwrap_or(credentials.endpoint_url);
    let addr = resolve(&endpoint).await?;

    let transport = QuicTransport::client(config.session.fingerprint.as_deref())?;
    let session = RelaySession::join(
        &transport,
        addr,
        &config.session.server_name,
        &config.session.name,
        identity,
        &credentials.token,
    )
    .await?;
    Ok(session)
}

async fn resolve(endpoint: &str) -> Result<SocketAddr, ClientError> {
    let unreachable = |reason: String| ClientError::Unreachable {
        addr: endpoint.to_string(),
        reason,
    };
    tokio::net::lookup_host(endpoint)
        .await
        .map_err(|e| unreachable(e.to_string()))?
        .next()
        .ok_or_else(|| unreachable("no address found".to_string()))
}

/// Get the default config directory path.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("studyroom")
}

/// Get the default config file path.
fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_means_defaults() {
        let config = load_config(Some("/nonexistent/studyroom/config.toml")).unwrap();
        assert_eq!(config.relay.port, 24900);
    }

    #[test]
    fn certs_are_generated_once() {
        let dir = std::env::temp_dir().join(format!("studyroom-certs-{}", uuid::Uuid::new_v4()));
        let (cert, key) = load_or_generate_certs(&dir).unwrap();
        let (cert_again, key_again) = load_or_generate_certs(&dir).unwrap();
        assert_eq!(cert, cert_again);
        assert_eq!(key, key_again);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn preissued_token_wins() {
        let mut config = Config::default();
        config.session.token = Some("tok".to_string());
        config.session.relay = Some("10.0.0.5:24900".to_string());

        let creds = credential_source(&config)
            .unwrap()
            .credentials("study-hall", "alice")
            .unwrap();
        assert_eq!(creds.token, "tok");
        assert_eq!(creds.endpoint_url, "10.0.0.5:24900");
    }

    #[test]
    fn missing_api_secret_is_misconfigured() {
        let err = credential_source(&Config::default()).err().unwrap();
        assert!(matches!(
            err,
            ClientError::Credentials(studyroom_auth::AuthError::Misconfigured(_))
        ));
        assert!(err.hint().contains("[credentials]"));
    }
}
