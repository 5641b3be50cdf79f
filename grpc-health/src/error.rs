//! Error types

use thiserror::Error;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the health-check server and client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// The tracing subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    /// Failed to open a listener
    #[error("failed to listen on {endpoint}: {source}")]
    Bind {
        /// Endpoint being bound, as displayed to the user
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Certificate, key or TLS configuration could not be loaded
    #[error("TLS error: {0}")]
    Tls(String),

    /// Failed to establish a connection to the target
    #[error("failed to connect to gRPC server at {target}: {source}")]
    Connect {
        /// Target being dialed
        target: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// The health check RPC itself failed
    #[error("health check request failed: {0}")]
    Rpc(Box<tonic::Status>),

    /// The server does not know the requested service
    #[error("health check request failed: service {service:?} not found: {}", .status.message())]
    ServiceNotFound {
        /// Requested service name
        service: String,
        /// Status returned by the server
        status: Box<tonic::Status>,
    },

    /// The server answered but the service is not serving
    #[error("service {service:?} is not serving: {status}")]
    NotServing {
        /// Requested service name
        service: String,
        /// Reported status name, e.g. `NOT_SERVING`
        status: String,
    },

    /// The serve loop terminated with an error
    #[error("failed to serve: {0}")]
    Serve(#[from] tonic::transport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify a failed health check RPC
    ///
    /// `NOT_FOUND` is the protocol's way of saying the service is unknown and
    /// is kept apart from transport failures.
    pub fn from_rpc_status(service: &str, status: tonic::Status) -> Self {
        if status.code() == tonic::Code::NotFound {
            Self::ServiceNotFound {
                service: service.to_string(),
                status: Box::new(status),
            }
        } else {
            Self::Rpc(Box::new(status))
        }
    }

    /// True when the target answered and reported a non-serving status
    pub fn is_not_serving(&self) -> bool {
        matches!(self, Self::NotServing { .. })
    }

    /// True when the target does not know the requested service
    pub fn is_service_not_found(&self) -> bool {
        matches!(self, Self::ServiceNotFound { .. })
    }

    /// True for dial, handshake and transport-level RPC failures
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Rpc(_))
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_service_not_found() {
        let err = Error::from_rpc_status("payments", tonic::Status::not_found("unknown service"));
        assert!(err.is_service_not_found());
        assert!(!err.is_not_serving());
        assert!(err.to_string().contains("payments"));
    }

    #[test]
    fn test_other_status_is_transport() {
        let err = Error::from_rpc_status("", tonic::Status::unavailable("connection refused"));
        assert!(err.is_transport());
        assert!(!err.is_service_not_found());
    }

    #[test]
    fn test_not_serving_message() {
        let err = Error::NotServing {
            service: "billing".to_string(),
            status: "NOT_SERVING".to_string(),
        };
        assert_eq!(err.to_string(), "service \"billing\" is not serving: NOT_SERVING");
        assert!(!err.is_transport());
    }
}
