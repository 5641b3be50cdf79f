//! gRPC health check server
//!
//! Lifecycle: [`HealthCheckServer::bind`] opens the listener (removing a stale
//! socket file first for Unix endpoints), [`Listening::serve`] loads TLS
//! credentials, registers the health responder and serves until the
//! cancellation token fires. Socket files are removed again on the way out.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use futures::Stream;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tokio_stream::wrappers::{TcpListenerStream, UnixListenerStream};
use tokio_util::sync::CancellationToken;
use tonic::transport::server::{Connected, Router};
use tonic::transport::Server;

use crate::address::Endpoint;
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::grpc::health::serving_health_service;
use crate::shutdown::GracefulStop;
use crate::tls::{load_server_config, tls_incoming};

/// Health check server
///
/// Reports `SERVING` for the overall server health until stopped.
#[derive(Debug)]
pub struct HealthCheckServer {
    config: ServerConfig,
}

impl HealthCheckServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bind the listener. Bind failures are fatal and not retried.
    #[tracing::instrument(name = "grpc_server", skip_all, fields(address = %self.config.endpoint()))]
    pub async fn bind(self) -> Result<Listening> {
        let endpoint = self.config.endpoint().clone();

        let (listener, socket_guard) = match &endpoint {
            Endpoint::Unix(path) => {
                remove_stale_socket(path);
                let listener = UnixListener::bind(path).map_err(|source| Error::Bind {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
                (BoundListener::Unix(listener), Some(SocketFileGuard::new(path.clone())))
            }
            Endpoint::Tcp(_) => {
                let listener = TcpListener::bind(endpoint.bind_address())
                    .await
                    .map_err(|source| Error::Bind {
                        endpoint: endpoint.to_string(),
                        source,
                    })?;
                (BoundListener::Tcp(listener), None)
            }
        };

        tracing::debug!(local_addr = ?listener.local_addr(), "Listener bound");

        Ok(Listening {
            config: self.config,
            listener,
            socket_guard,
        })
    }

    /// Bind and serve until `shutdown` is cancelled.
    ///
    /// Returns `Ok(())` after a clean shutdown, or the first fatal error.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        self.bind().await?.serve(shutdown).await
    }
}

enum BoundListener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl BoundListener {
    fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Self::Tcp(listener) => listener.local_addr().ok(),
            Self::Unix(_) => None,
        }
    }
}

/// A bound server that has not started serving yet
pub struct Listening {
    config: ServerConfig,
    listener: BoundListener,
    socket_guard: Option<SocketFileGuard>,
}

impl Listening {
    /// Actual TCP address, useful when binding port 0
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr()
    }

    /// Socket path for Unix endpoints
    pub fn socket_path(&self) -> Option<&Path> {
        self.config.endpoint().socket_path()
    }

    /// Address the server was configured with
    pub fn endpoint(&self) -> &Endpoint {
        self.config.endpoint()
    }

    /// Serve health checks until `shutdown` is cancelled.
    ///
    /// TLS credentials are loaded first; a load failure aborts startup. TLS
    /// is never used on Unix sockets.
    #[tracing::instrument(name = "grpc_server", skip_all, fields(address = %self.config.endpoint()))]
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let Listening {
            config,
            listener,
            socket_guard,
        } = self;
        let address = config.endpoint().to_string();

        let tls = match (&listener, config.tls()) {
            (BoundListener::Unix(_), _) => {
                if config.requested_tls().is_some() {
                    tracing::warn!("TLS is not applicable to Unix domain sockets, ignoring certificate files");
                }
                tracing::info!(
                    address = %address,
                    socket_path = %config.endpoint().bind_address(),
                    "Starting gRPC server on Unix Domain Socket"
                );
                None
            }
            (BoundListener::Tcp(_), Some(files)) => {
                let server_config = load_server_config(files)?;
                tracing::info!(
                    address = %address,
                    cert_file = %files.cert_path.display(),
                    key_file = %files.key_path.display(),
                    "Starting gRPC server with TLS"
                );
                Some(server_config)
            }
            (BoundListener::Tcp(_), None) => {
                tracing::info!(address = %address, "Starting gRPC server without TLS");
                None
            }
        };

        let router = Server::builder().add_service(serving_health_service().await);
        let stop = GracefulStop::new(shutdown);

        let result = match listener {
            BoundListener::Tcp(listener) => {
                let incoming = TcpListenerStream::new(listener);
                match tls {
                    Some(server_config) => {
                        serve_incoming(router, tls_incoming(incoming, server_config), stop.wait()).await
                    }
                    None => serve_incoming(router, incoming, stop.wait()).await,
                }
            }
            BoundListener::Unix(listener) => {
                serve_incoming(router, UnixListenerStream::new(listener), stop.wait()).await
            }
        };

        // The listener is closed by now; the socket file can go.
        drop(socket_guard);

        match &result {
            Ok(()) => tracing::info!("gRPC server stopped"),
            Err(e) => tracing::error!(error = %e, "gRPC server terminated"),
        }
        result
    }
}

async fn serve_incoming<I, IO, IE, F>(router: Router, incoming: I, signal: F) -> Result<()>
where
    I: Stream<Item = std::result::Result<IO, IE>> + Send + 'static,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IO::ConnectInfo: Clone + Send + Sync + 'static,
    IE: Into<Box<dyn std::error::Error + Send + Sync>>,
    F: Future<Output = ()> + Send + 'static,
{
    router
        .serve_with_incoming_shutdown(incoming, signal)
        .await
        .map_err(Error::Serve)
}

/// Best-effort removal of whatever occupies the socket path, directories
/// included, left over from an unclean shutdown
fn remove_stale_socket(path: &Path) {
    let removed = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) => Err(e),
    };
    match removed {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed existing socket file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove existing socket file");
        }
    }
}

/// Removes the socket file when dropped
struct SocketFileGuard {
    path: PathBuf,
}

impl SocketFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Drop for SocketFileGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed socket file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to cleanup socket file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_tcp_port_zero() {
        let listening = HealthCheckServer::new(ServerConfig::new("127.0.0.1:0"))
            .bind()
            .await
            .unwrap();
        let addr = listening.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(listening.socket_path().is_none());
    }

    #[tokio::test]
    async fn test_bind_port_in_use_is_fatal() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = taken.local_addr().unwrap().to_string();

        let err = HealthCheckServer::new(ServerConfig::new(&address))
            .bind()
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Bind { .. }));
        assert!(err.to_string().contains(&address));
    }

    #[tokio::test]
    async fn test_bind_invalid_address_is_fatal() {
        let err = HealthCheckServer::new(ServerConfig::new("invalid-address"))
            .bind()
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Bind { .. }));
    }

    #[tokio::test]
    async fn test_bind_unix_replaces_stale_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        std::fs::write(&path, b"stale").unwrap();

        let listening = HealthCheckServer::new(ServerConfig::new(path.to_str().unwrap()))
            .bind()
            .await
            .unwrap();
        assert_eq!(listening.socket_path(), Some(path.as_path()));
        assert!(listening.local_addr().is_none());

        drop(listening);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_bind_unix_replaces_stale_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("leftover"), b"stale").unwrap();

        let listening = HealthCheckServer::new(ServerConfig::new(path.to_str().unwrap()))
            .bind()
            .await
            .unwrap();
        assert!(!path.is_dir());

        drop(listening);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_invalid_certificate_aborts_startup() {
        let config = ServerConfig::new("127.0.0.1:0").with_tls("nonexistent.crt", "nonexistent.key");
        let err = HealthCheckServer::new(config)
            .run(CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Tls(_)));
    }

    #[test]
    fn test_socket_guard_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let guard = SocketFileGuard::new(dir.path().join("never-created.sock"));
        drop(guard);
    }
}
