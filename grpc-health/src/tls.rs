//! TLS support using rustls
//!
//! Server side: [`load_server_config`] builds a rustls [`ServerConfig`] from a
//! PEM certificate/key pair and [`tls_incoming`] performs the handshake on
//! accepted TCP connections before they reach tonic.
//!
//! Client side: [`client_config`] builds the credentials for
//! [`ClientTls::Verified`] (system trust roots) or [`ClientTls::SkipVerify`].

use std::fs::File;
use std::io::{self, BufReader};
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_rustls::rustls::{
    self,
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider},
    pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime},
    ClientConfig, DigitallySignedStruct, RootCertStore, ServerConfig, SignatureScheme,
};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

use crate::config::{ClientTls, TlsFiles};
use crate::error::{Error, Result};

/// ALPN protocol id for HTTP/2, required by gRPC over TLS
const ALPN_H2: &[u8] = b"h2";

/// Upper bound on a single server-side handshake
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Handshakes in flight before accepting pauses
pub const MAX_PENDING_HANDSHAKES: usize = 256;

fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Load a rustls [`ServerConfig`] from PEM certificate and key files.
///
/// Reads the certificate chain and private key from disk and constructs
/// a server configuration with no client authentication required.
pub fn load_server_config(files: &TlsFiles) -> Result<Arc<ServerConfig>> {
    let cert_chain = load_certs(files)?;
    let key = load_private_key(files)?;

    let mut config = ServerConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(format!("Failed to select TLS protocol versions: {}", e)))?
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .map_err(|e| Error::Tls(format!("Failed to build TLS server config: {}", e)))?;
    config.alpn_protocols = vec![ALPN_H2.to_vec()];

    Ok(Arc::new(config))
}

fn load_certs(files: &TlsFiles) -> Result<Vec<CertificateDer<'static>>> {
    let cert_file = File::open(&files.cert_path).map_err(|e| {
        Error::Tls(format!(
            "Failed to open TLS cert file '{}': {}",
            files.cert_path.display(),
            e
        ))
    })?;
    let mut cert_reader = BufReader::new(cert_file);
    let cert_chain = rustls_pemfile::certs(&mut cert_reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("Failed to parse TLS certificates: {}", e)))?;

    if cert_chain.is_empty() {
        return Err(Error::Tls(format!(
            "TLS cert file '{}' contains no certificates",
            files.cert_path.display()
        )));
    }

    Ok(cert_chain)
}

fn load_private_key(files: &TlsFiles) -> Result<PrivateKeyDer<'static>> {
    let key_file = File::open(&files.key_path).map_err(|e| {
        Error::Tls(format!(
            "Failed to open TLS key file '{}': {}",
            files.key_path.display(),
            e
        ))
    })?;
    let mut key_reader = BufReader::new(key_file);
    rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| Error::Tls(format!("Failed to parse TLS private key: {}", e)))?
        .ok_or_else(|| {
            Error::Tls(format!(
                "TLS key file '{}' contains no private key",
                files.key_path.display()
            ))
        })
}

/// Wrap accepted TCP connections with TLS termination.
///
/// Handshakes run concurrently, up to [`MAX_PENDING_HANDSHAKES`] at a time,
/// so a peer that stalls mid-handshake does not hold up other connections.
/// Failed or stalled handshakes are logged and skipped; they never end the
/// stream.
pub fn tls_incoming<S>(
    tcp: S,
    server_config: Arc<ServerConfig>,
) -> impl Stream<Item = io::Result<TlsStream<TcpStream>>> + Send + Unpin
where
    S: Stream<Item = io::Result<TcpStream>> + Send + Unpin + 'static,
{
    let acceptor = TlsAcceptor::from(server_config);

    Box::pin(
        tcp.map(move |accepted| handshake(acceptor.clone(), accepted))
            .buffer_unordered(MAX_PENDING_HANDSHAKES)
            .filter_map(futures::future::ready),
    )
}

async fn handshake(
    acceptor: TlsAcceptor,
    accepted: io::Result<TcpStream>,
) -> Option<io::Result<TlsStream<TcpStream>>> {
    let stream = match accepted {
        Ok(stream) => stream,
        Err(e) => return Some(Err(e)),
    };
    let peer = stream.peer_addr().ok();

    match tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
        Ok(Ok(tls_stream)) => Some(Ok(tls_stream)),
        Ok(Err(e)) => {
            tracing::warn!(peer = ?peer, error = %e, "TLS handshake failed");
            None
        }
        Err(_) => {
            tracing::warn!(peer = ?peer, "TLS handshake timed out");
            None
        }
    }
}

/// Build client-side TLS credentials.
///
/// Returns `None` for [`ClientTls::Plaintext`].
pub fn client_config(tls: ClientTls) -> Result<Option<Arc<ClientConfig>>> {
    let provider = crypto_provider();
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(format!("Failed to select TLS protocol versions: {}", e)))?;

    let mut config = match tls {
        ClientTls::Plaintext => return Ok(None),
        ClientTls::Verified => builder
            .with_root_certificates(native_roots())
            .with_no_client_auth(),
        ClientTls::SkipVerify => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipServerVerification::new(provider)))
            .with_no_client_auth(),
    };
    config.alpn_protocols = vec![ALPN_H2.to_vec()];

    Ok(Some(Arc::new(config)))
}

fn native_roots() -> RootCertStore {
    let loaded = rustls_native_certs::load_native_certs();
    for err in &loaded.errors {
        tracing::warn!(error = %err, "Failed to load a system trust root");
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
    tracing::debug!(added, ignored, "Loaded system trust roots");
    roots
}

/// Accepts any server certificate.
///
/// Handshake signatures are still verified, so the peer must hold the key for
/// the certificate it presents; only the chain of trust and the server name
/// are not checked.
#[derive(Debug)]
pub struct SkipServerVerification {
    provider: Arc<CryptoProvider>,
}

impl SkipServerVerification {
    /// Verifier using the given provider's signature algorithms
    pub fn new(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }
}

impl ServerCertVerifier for SkipServerVerification {
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
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn self_signed() -> (NamedTempFile, NamedTempFile) {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        (
            write_temp(&certified.cert.pem()),
            write_temp(&certified.key_pair.serialize_pem()),
        )
    }

    fn files(cert: &NamedTempFile, key: &NamedTempFile) -> TlsFiles {
        TlsFiles {
            cert_path: cert.path().to_path_buf(),
            key_path: key.path().to_path_buf(),
        }
    }

    #[test]
    fn test_load_server_config() {
        let (cert, key) = self_signed();
        let config = load_server_config(&files(&cert, &key)).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"h2".to_vec()]);
    }

    #[test]
    fn test_missing_cert_file() {
        let (_, key) = self_signed();
        let files = TlsFiles {
            cert_path: "nonexistent.crt".into(),
            key_path: key.path().to_path_buf(),
        };
        let err = load_server_config(&files).unwrap_err();
        assert!(err.to_string().contains("nonexistent.crt"));
    }

    #[test]
    fn test_cert_file_without_certificates() {
        let (_, key) = self_signed();
        let empty = write_temp("not a certificate\n");
        let err = load_server_config(&files(&empty, &key)).unwrap_err();
        assert!(err.to_string().contains("no certificates"));
    }

    #[test]
    fn test_key_file_without_key() {
        let (cert, _) = self_signed();
        let err = load_server_config(&files(&cert, &cert)).unwrap_err();
        assert!(err.to_string().contains("no private key"));
    }

    #[test]
    fn test_client_config_branches() {
        assert!(client_config(ClientTls::Plaintext).unwrap().is_none());

        let verified = client_config(ClientTls::Verified).unwrap().unwrap();
        assert_eq!(verified.alpn_protocols, vec![b"h2".to_vec()]);

        let insecure = client_config(ClientTls::SkipVerify).unwrap().unwrap();
        assert_eq!(insecure.alpn_protocols, vec![b"h2".to_vec()]);
    }
}
