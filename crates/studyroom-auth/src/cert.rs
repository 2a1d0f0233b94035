//! Self-signed relay certificates.

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

use crate::error::AuthError;

/// A generated certificate and private key pair.
pub struct GeneratedCert {
    /// PEM-encoded certificate.
    pub cert_pem: String,
    /// PEM-encoded private key.
    pub key_pem: String,
    /// SHA-256 fingerprint of the DER-encoded certificate.
    pub fingerprint: String,
}

/// Generate a new self-signed certificate for a relay.
///
/// The certificate is valid for the given hostname and includes
/// `localhost` and `127.0.0.1` as subject alternative names.
pub fn generate_certificate(hostname: &str) -> Result<GeneratedCert, AuthError> {
    let key_pair = KeyPair::generate().map_err(|e| AuthError::Certificate(e.to_string()))?;

    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, hostname);
    dn.push(DnType::OrganizationName, "studyroom relay");
    params.distinguished_name = dn;

    let dns_name = |name: &str| -> Result<rcgen::SanType, AuthError> {
        let ia5 = name
            .try_into()
            .map_err(|e: rcgen::Error| AuthError::Certificate(e.to_string()))?;
        Ok(rcgen::SanType::DnsName(ia5))
    };
    params.subject_alt_names = vec![
        dns_name(hostname)?,
        dns_name("localhost")?,
        rcgen::SanType::IpAddress(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)),
    ];

    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| AuthError::Certificate(e.to_string()))?;

    Ok(GeneratedCert {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
        fingerprint: sha256_fingerprint(cert.der()),
    })
}

/// SHA-256 fingerprint of DER-encoded certificate bytes, as
/// `SHA256:aa:bb:...`.
pub fn sha256_fingerprint(der: &[u8]) -> String {
    use std::fmt::Write;
    let digest = ring::digest::digest(&ring::digest::SHA256, der);
    let mut fingerprint = String::from("SHA256:");
    for (i, byte) in digest.as_ref().iter().enumerate() {
        if i > 0 {
            fingerprint.push(':');
        }
        let _ = write!(fingerprint, "{byte:02x}");
    }
    fingerprint
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_cert_succeeds() {
        let cert = generate_certificate("relay-host").unwrap();
        assert!(cert.cert_pem.contains("BEGIN CERTIFICATE"));
        assert!(cert.key_pem.contains("BEGIN PRIVATE KEY"));
        assert!(cert.fingerprint.starts_with("SHA256:"));
    }

    #[test]
    fn fingerprint_format() {
        let fingerprint = sha256_fingerprint(b"not really a certificate");
        // "SHA256:" + 32 bytes as two hex digits joined by 31 colons.
        assert_eq!(fingerprint.len(), 7 + 32 * 2 + 31);
        assert_eq!(fingerprint, sha256_fingerprint(b"not really a certificate"));
        assert_ne!(fingerprint, sha256_fingerprint(b"something else"));
    }
}
