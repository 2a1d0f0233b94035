//! TLS configuration for the relay's QUIC endpoint.
//!
//! The relay presents a self-signed certificate. Peers either pin its SHA-256
//! fingerprint (recommended) or, when no fingerprint is configured, accept
//! whatever certificate the relay presents.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use tracing::{debug, warn};

use crate::error::ProtocolError;

/// ALPN identifier for the relay protocol.
pub const ALPN: &[u8] = b"studyroom/0.1";

/// Build a quinn `ServerConfig` from PEM-encoded cert and key.
pub fn server_config(cert_pem: &str, key_pem: &str) -> Result<quinn::ServerConfig, ProtocolError> {
    let certs = parse_certs(cert_pem)?;
    let key = parse_key(key_pem)?;

    let mut tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ProtocolError::Tls(e.to_string()))?;

    tls_config.alpn_protocols = vec![ALPN.to_vec()];

    let config = quinn::ServerConfig::with_crypto(Arc::new(
        quinn::crypto::rustls::QuicServerConfig::try_from(tls_config)
            .map_err(|e| ProtocolError::Tls(e.to_string()))?,
    ));
    debug!("built relay TLS config");
    Ok(config)
}

/// Build a quinn `ClientConfig` for connecting to a relay.
///
/// With `pinned_fingerprint` set, the handshake fails unless the relay's
/// certificate has exactly that fingerprint.
pub fn client_config(pinned_fingerprint: Option<&str>) -> Result<quinn::ClientConfig, ProtocolError> {
    if pinned_fingerprint.is_none() {
        warn!("no relay fingerprint configured, relay certificate will not be verified");
    }

    let verifier = RelayCertVerifier {
        pinned: pinned_fingerprint.map(str::to_string),
        algorithms: rustls::crypto::ring::default_provider().signature_verification_algorithms,
    };

    let mut tls_config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();

    tls_config.alpn_protocols = vec![ALPN.to_vec()];

    let config = quinn::ClientConfig::new(Arc::new(
        quinn::crypto::rustls::QuicClientConfig::try_from(tls_config)
            .map_err(|e| ProtocolError::Tls(e.to_string()))?,
    ));
    debug!(pinned = pinned_fingerprint.is_some(), "built client TLS config");
    Ok(config)
}

/// Fingerprint of the first certificate in `cert_pem`, in the form peers pin.
pub fn pem_fingerprint(cert_pem: &str) -> Result<String, ProtocolError> {
    let certs = parse_certs(cert_pem)?;
    Ok(studyroom_auth::cert::sha256_fingerprint(certs[0].as_ref()))
}

fn parse_certs(pem: &str) -> Result<Vec<CertificateDer<'static>>, ProtocolError> {
    let mut reader = std::io::BufReader::new(pem.as_bytes());
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ProtocolError::Tls(format!("failed to parse certificate PEM: {e}")))?;
    if certs.is_empty() {
        return Err(ProtocolError::Tls(
            "no certificates found in PEM".to_string(),
        ));
    }
    Ok(certs)
}

fn parse_key(pem: &str) -> Result<PrivateKeyDer<'static>, ProtocolError> {
    let mut reader = std::io::BufReader::new(pem.as_bytes());
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| ProtocolError::Tls(format!("failed to parse key PEM: {e}")))?
        .ok_or_else(|| ProtocolError::Tls("no private key found in PEM".to_string()))
}

/// Trust-on-fingerprint verifier for self-signed relay certificates.
///
/// Chain building is skipped; handshake signatures are still checked against
/// the presented certificate.
#[derive(Debug)]
struct RelayCertVerifier {
    pinned: Option<String>,
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for RelayCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if let Some(pinned) = &self.pinned {
            let presented = studyroom_auth::cert::sha256_fingerprint(end_entity.as_ref());
            if !presented.eq_ignore_ascii_case(pinned) {
                warn!(%presented, expected = %pinned, "relay certificate fingerprint mismatch");
                return Err(rustls::Error::InvalidCertificate(
                    rustls::CertificateError::ApplicationVerificationFailure,
                ));
            }
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
