//! Credentials and certificates for studyroom.
//!
//! Issues and verifies the signed join tokens that gate access to a session,
//! and generates the self-signed certificate a relay presents. Relay
//! certificates are identified by their SHA-256 fingerprint for
//! trust-on-first-use pinning.

pub mod cert;
pub mod error;
pub mod token;

pub use cert::{generate_certificate, GeneratedCert};
pub use error::AuthError;
pub use token::{Claims, CredentialIssuer, CredentialSource, Credentials, StaticCredentials, TokenVerifier};
