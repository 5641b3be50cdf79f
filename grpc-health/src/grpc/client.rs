//! gRPC health check client
//!
//! Dials the configured endpoint through a custom connector (TCP or Unix
//! socket, optionally wrapped in TLS), sends one `Check` request and
//! classifies the outcome:
//!
//! - `SERVING` → [`HealthReport`]
//! - any other status → [`Error::NotServing`]
//! - `NOT_FOUND` → [`Error::ServiceNotFound`]
//! - transport failures → [`Error::Connect`] / [`Error::Rpc`]

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::Uri;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::ClientConfig as TlsClientConfig;
use tokio_rustls::TlsConnector;
use tonic::transport::{Channel, Endpoint as TonicEndpoint};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;
use tower::service_fn;

use crate::address::Endpoint;
use crate::config::{ClientConfig, ClientTls};
use crate::error::{Error, Result};
use crate::grpc::peer::{PeerCertificate, PeerInfo, PeerSlot};
use crate::tls::client_config;

/// Outcome of a successful health check
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Service name that was checked (empty for overall health)
    pub service: String,
    /// Reported status
    pub status: ServingStatus,
    /// Wall-clock duration of the `Check` call
    pub duration: Duration,
    /// Remote peer, if the connector saw one
    pub peer: Option<PeerInfo>,
}

/// One-shot health check client
#[derive(Debug, Clone)]
pub struct HealthCheckClient {
    config: ClientConfig,
}

impl HealthCheckClient {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Connect, send one health check request and classify the answer.
    ///
    /// The connection is dropped before returning, on every path. There is no
    /// built-in deadline; wrap the call in `tokio::time::timeout` if needed.
    #[tracing::instrument(
        name = "grpc_client",
        skip_all,
        fields(address = %self.config.endpoint(), service = %self.config.service())
    )]
    pub async fn check(&self) -> Result<HealthReport> {
        let service = self.config.service().to_string();
        let peer = PeerSlot::default();
        let channel = self.connect(peer.clone()).await?;
        let mut client = HealthClient::new(channel);

        tracing::info!(
            address = %self.config.endpoint(),
            service = %service,
            "Sending health check request"
        );

        let request = tonic::Request::new(HealthCheckRequest {
            service: service.clone(),
        });
        let start = Instant::now();
        let response = client.check(request).await;
        let duration = start.elapsed();

        let response = response.map_err(|status| Error::from_rpc_status(&service, status))?;
        let status = response.into_inner().status();
        let peer = peer.get();

        tracing::info!(
            service = %service,
            status = status.as_str_name(),
            duration = ?duration,
            peer = %peer.as_ref().map(|p| p.address.as_str()).unwrap_or("unknown"),
            "Received health check response"
        );

        if let Some(cert) = peer.as_ref().and_then(|p| p.certificate.as_ref()) {
            tracing::info!(
                subject = %cert.subject,
                issuer = %cert.issuer,
                not_before = %cert.not_before,
                not_after = %cert.not_after,
                "Peer certificate information"
            );
        }

        if status != ServingStatus::Serving {
            return Err(Error::NotServing {
                service,
                status: status.as_str_name().to_string(),
            });
        }

        Ok(HealthReport {
            service,
            status,
            duration,
            peer,
        })
    }

    async fn connect(&self, peer: PeerSlot) -> Result<Channel> {
        let endpoint = self.config.endpoint().clone();
        let tls = self.config.tls();
        let target = endpoint.to_string();

        let tls_config = client_config(tls)?;
        match tls {
            ClientTls::Plaintext => tracing::info!("Using plaintext connection"),
            ClientTls::Verified => tracing::info!("Using TLS with certificate verification"),
            ClientTls::SkipVerify => {
                tracing::warn!("Using TLS with insecure mode (certificate verification disabled)")
            }
        }

        let connector = Connector::new(endpoint.clone(), tls_config, peer)?;
        let uri = format!("http://{}", uri_authority(&endpoint));

        let channel = TonicEndpoint::from_shared(uri)
            .map_err(|source| Error::Connect {
                target: target.clone(),
                source,
            })?
            .connect_with_connector(service_fn(move |_: Uri| {
                let connector = connector.clone();
                async move { connector.connect().await }
            }))
            .await
            .map_err(|source| Error::Connect { target, source })?;

        Ok(channel)
    }
}

fn uri_authority(endpoint: &Endpoint) -> String {
    match endpoint {
        Endpoint::Tcp(_) => endpoint.dial_address(),
        Endpoint::Unix(_) => endpoint.authority(),
    }
}

/// Byte stream handed to the HTTP/2 client
trait ClientIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> ClientIo for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Dials the endpoint, runs the TLS handshake and records the peer
#[derive(Clone)]
struct Connector {
    endpoint: Endpoint,
    tls: Option<(TlsConnector, ServerName<'static>)>,
    peer: PeerSlot,
}

impl Connector {
    fn new(endpoint: Endpoint, tls: Option<Arc<TlsClientConfig>>, peer: PeerSlot) -> Result<Self> {
        let tls = match tls {
            Some(config) => {
                let server_name = ServerName::try_from(endpoint.authority()).map_err(|e| {
                    Error::Tls(format!("Invalid TLS server name '{}': {}", endpoint.authority(), e))
                })?;
                Some((TlsConnector::from(config), server_name))
            }
            None => None,
        };

        Ok(Self { endpoint, tls, peer })
    }

    async fn connect(&self) -> io::Result<TokioIo<Box<dyn ClientIo>>> {
        let (stream, address, certificate) = match &self.endpoint {
            Endpoint::Tcp(_) => {
                let stream = TcpStream::connect(self.endpoint.dial_address()).await?;
                stream.set_nodelay(true)?;
                let address = stream.peer_addr()?.to_string();
                let (stream, certificate) = self.wrap_tls(stream).await?;
                (stream, address, certificate)
            }
            Endpoint::Unix(path) => {
                let stream = UnixStream::connect(path).await?;
                let (stream, certificate) = self.wrap_tls(stream).await?;
                (stream, path.display().to_string(), certificate)
            }
        };

        tracing::debug!(peer = %address, tls = self.tls.is_some(), "Connection established");
        self.peer.set(PeerInfo {
            address,
            certificate,
        });

        Ok(TokioIo::new(stream))
    }

    async fn wrap_tls<S>(&self, stream: S) -> io::Result<(Box<dyn ClientIo>, Option<PeerCertificate>)>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let Some((connector, server_name)) = &self.tls else {
            return Ok((Box::new(stream), None));
        };

        let tls_stream = connector.connect(server_name.clone(), stream).await?;
        let (_, session) = tls_stream.get_ref();
        let certificate = session
            .peer_certificates()
            .and_then(|certs| certs.first())
            .and_then(PeerCertificate::from_der);

        Ok((Box::new(tls_stream), certificate))
    }
}
