//! TLS for PostgreSQL sessions.
//!
//! A session is opened by trying each [`SslMode`] in
//! [`SslMode::NEGOTIATION_ORDER`] and keeping the first one the server
//! accepts. The TLS modes encrypt without authenticating the server, the same
//! as libpq's `prefer` and `require`.

use std::fmt;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio_postgres_rustls::MakeRustlsConnect;

use crate::error::{MigrateError, Result};

/// SSL mode a session was negotiated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    Disable,
    Prefer,
    #[default]
    Require,
}

impl SslMode {
    /// Order in which connection attempts are made.
    pub const NEGOTIATION_ORDER: [SslMode; 3] = [SslMode::Require, SslMode::Prefer, SslMode::Disable];

    pub fn as_str(&self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
        }
    }

    /// Equivalent tokio-postgres setting.
    pub fn to_pg(self) -> tokio_postgres::config::SslMode {
        match self {
            SslMode::Disable => tokio_postgres::config::SslMode::Disable,
            SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
            SslMode::Require => tokio_postgres::config::SslMode::Require,
        }
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// rustls connector for one negotiation attempt; `None` for plain TCP.
pub fn pg_connector(mode: SslMode) -> Result<Option<MakeRustlsConnect>> {
    if mode == SslMode::Disable {
        return Ok(None);
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = EncryptOnly {
        algorithms: provider.signature_verification_algorithms,
    };
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| MigrateError::Config(format!("TLS setup failed: {}", e)))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();

    Ok(Some(MakeRustlsConnect::new(config)))
}

/// Accepts any server certificate but still checks handshake signatures
/// against it.
#[derive(Debug)]
struct EncryptOnly {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for EncryptOnly {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negotiation_starts_with_tls() {
        assert_eq!(
            SslMode::NEGOTIATION_ORDER,
            [SslMode::Require, SslMode::Prefer, SslMode::Disable]
        );
        assert_eq!(SslMode::default(), SslMode::NEGOTIATION_ORDER[0]);
    }

    #[test]
    fn test_connector_per_mode() {
        assert!(pg_connector(SslMode::Disable).unwrap().is_none());
        assert!(pg_connector(SslMode::Prefer).unwrap().is_some());
        assert!(pg_connector(SslMode::Require).unwrap().is_some());
    }

    #[test]
    fn test_display_matches_libpq_names() {
        assert_eq!(SslMode::Prefer.to_string(), "prefer");
        assert_eq!(
            SslMode::Require.to_pg(),
            tokio_postgres::config::SslMode::Require
        );
    }
}
