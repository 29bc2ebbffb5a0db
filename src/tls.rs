//! TLS configuration for MaazDB connections.

use std::sync::Arc;

use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::CryptoProvider;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};

use crate::error::Result;

/// Server certificate verification policy.
///
/// The reference driver hardcoded `rejectUnauthorized: false`; here the
/// trust decision is an explicit configuration value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CertVerification {
    /// Verify the server certificate against the Mozilla root program, plus
    /// any extra roots added to [`TlsOptions`].
    #[default]
    WebPkiRoots,
    /// Skip certificate verification entirely. The connection is still
    /// encrypted, but the peer is not authenticated; intended for
    /// development servers with self-signed certificates.
    AcceptInvalid,
}

/// TLS options for [`ConnectionBuilder::connect_tls`].
///
/// [`ConnectionBuilder::connect_tls`]: crate::ConnectionBuilder::connect_tls
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    verify: CertVerification,
    extra_roots: Vec<CertificateDer<'static>>,
}

impl TlsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the certificate verification policy.
    pub fn verify(mut self, verify: CertVerification) -> Self {
        self.verify = verify;
        self
    }

    /// Adds a DER-encoded CA certificate to the trust store.
    ///
    /// Only consulted under [`CertVerification::WebPkiRoots`].
    pub fn add_root(mut self, cert: CertificateDer<'static>) -> Self {
        self.extra_roots.push(cert);
        self
    }

    pub(crate) fn connector(&self) -> Result<TlsConnector> {
        let provider = Arc::new(tokio_rustls::rustls::crypto::aws_lc_rs::default_provider());
        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| format!("tls configuration failed: {e}"))?;

        let config = match self.verify {
            CertVerification::WebPkiRoots => {
                let mut roots = RootCertStore::empty();
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                for cert in &self.extra_roots {
                    roots
                        .add(cert.clone())
                        .map_err(|e| format!("invalid root certificate: {e}"))?;
                }
                builder.with_root_certificates(roots).with_no_client_auth()
            }
            CertVerification::AcceptInvalid => builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerification(provider)))
                .with_no_client_auth(),
        };

        Ok(TlsConnector::from(Arc::new(config)))
    }
}

pub(crate) fn server_name(host: &str) -> Result<ServerName<'static>> {
    ServerName::try_from(host.to_string()).map_err(|_| format!("invalid server name '{host}'").into())
}

/// Accepts any server certificate. See [`CertVerification::AcceptInvalid`].
#[derive(Debug)]
struct NoVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::{CertVerification, TlsOptions, server_name};

    #[test]
    fn test_connector_builds_with_default_roots() {
        TlsOptions::new().connector().unwrap();
    }

    #[test]
    fn test_connector_builds_without_verification() {
        TlsOptions::new()
            .verify(CertVerification::AcceptInvalid)
            .connector()
            .unwrap();
    }

    #[test]
    fn test_server_name() {
        server_name("localhost").unwrap();
        server_name("127.0.0.1").unwrap();
        assert!(server_name("not a hostname").is_err());
    }
}
