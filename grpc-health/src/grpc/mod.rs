//! gRPC health checking over TCP or Unix-domain sockets
//!
//! - [`server`]: serves `grpc.health.v1.Health` reporting `SERVING` for the
//!   overall server, with optional TLS on TCP listeners.
//! - [`client`]: issues a single `Check` call and classifies the outcome.
//!
//! ## Example
//!
//! ```ignore
//! use grpc_health::prelude::*;
//!
//! let token = CancellationToken::new();
//! let server = HealthCheckServer::new(ServerConfig::new("127.0.0.1:50051"));
//! let handle = tokio::spawn(server.run(token.clone()));
//!
//! let report = HealthCheckClient::new(ClientConfig::new("127.0.0.1:50051"))
//!     .check()
//!     .await?;
//! assert_eq!(report.status, ServingStatus::Serving);
//!
//! token.cancel();
//! handle.await??;
//! ```

pub mod client;
pub mod health;
pub mod peer;
pub mod server;

// Re-exports
pub use client::{HealthCheckClient, HealthReport};
pub use health::{serving_health_service, OVERALL_SERVICE};
pub use peer::{PeerCertificate, PeerInfo};
pub use server::{HealthCheckServer, Listening};

// Re-export tonic-health types for convenience
pub use tonic_health::pb::health_check_response::ServingStatus;
