#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;

use grpc_health::prelude::*;
use tempfile::NamedTempFile;
use tokio::task::JoinHandle;

/// Self-signed certificate and key written to temporary PEM files
pub struct TestCert {
    pub cert: NamedTempFile,
    pub key: NamedTempFile,
}

impl TestCert {
    pub fn generate() -> Self {
        let certified = rcgen::generate_simple_self_signed(vec![
            "localhost".to_string(),
            "127.0.0.1".to_string(),
        ])
        .expect("Failed to generate certificate");

        Self {
            cert: write_temp(&certified.cert.pem()),
            key: write_temp(&certified.key_pair.serialize_pem()),
        }
    }

    pub fn server_config(&self, address: &str) -> ServerConfig {
        ServerConfig::new(address).with_tls(self.cert.path(), self.key.path())
    }
}

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write temp file");
    file
}

/// A server running in the background
pub struct RunningServer {
    pub addr: Option<SocketAddr>,
    pub token: CancellationToken,
    pub handle: JoinHandle<Result<()>>,
}

impl RunningServer {
    /// Address to dial: `ip:port` for TCP
    pub fn tcp_address(&self) -> String {
        self.addr.expect("server is not on TCP").to_string()
    }

    /// Cancel and wait for a clean shutdown
    pub async fn stop(self) {
        self.token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(3), self.handle)
            .await
            .expect("Server did not shut down gracefully")
            .expect("Server task panicked");
        assert!(result.is_ok(), "server error: {:?}", result);
    }
}

/// Bind and start serving in a background task
pub async fn start_server(config: ServerConfig) -> RunningServer {
    let listening = HealthCheckServer::new(config)
        .bind()
        .await
        .expect("Failed to bind server");
    let addr = listening.local_addr();
    let token = CancellationToken::new();
    let handle = tokio::spawn(listening.serve(token.clone()));

    RunningServer { addr, token, handle }
}

pub fn plaintext_client(address: &str) -> HealthCheckClient {
    HealthCheckClient::new(ClientConfig::new(address))
}
