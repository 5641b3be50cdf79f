//! # grpc-health
//!
//! Client and server for the standard gRPC Health Checking protocol.
//!
//! ## Features
//!
//! - **Address classification**: `host:port`, `:port`, `/path.sock`,
//!   `unix:path` and `unix:///path` map onto [`address::Endpoint`]
//! - **Server**: reports `SERVING` for the overall server health on TCP
//!   (optionally TLS) or a Unix-domain socket, with graceful shutdown and
//!   socket-file cleanup
//! - **Client**: one `Check` call over plaintext, verified TLS, or TLS without
//!   certificate verification, reporting status, latency and peer certificate
//!
//! ## Example
//!
//! ```rust,no_run
//! use grpc_health::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let token = CancellationToken::new();
//!     cancel_on_signal(token.clone());
//!
//!     HealthCheckServer::new(ServerConfig::new(":50051"))
//!         .run(token)
//!         .await
//! }
//! ```

pub mod address;
pub mod config;
pub mod error;
pub mod grpc;
pub mod observability;
pub mod shutdown;
pub mod tls;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::address::Endpoint;
    pub use crate::config::{ClientConfig, ClientTls, Config, LogConfig, LogFormat, ServerConfig, TlsFiles};
    pub use crate::error::{Error, Result};
    pub use crate::grpc::{
        HealthCheckClient, HealthCheckServer, HealthReport, Listening, PeerCertificate, PeerInfo,
        ServingStatus,
    };
    pub use crate::observability::init_tracing;
    pub use crate::shutdown::{cancel_on_signal, shutdown_signal, GracefulStop};

    pub use tokio_util::sync::CancellationToken;

    // Re-export tracing macros and types
    pub use tracing::{debug, error, info, instrument, trace, warn, Level, Span};
}
