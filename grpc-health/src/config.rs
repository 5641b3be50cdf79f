//! Configuration
//!
//! Two kinds of configuration live here:
//!
//! - [`Config`]: ambient process settings (logging), loaded using Figment from
//!   defaults overridden by environment variables (prefix: `GRPC_HEALTH_`).
//!   There are no configuration files.
//! - [`ServerConfig`] and [`ClientConfig`]: per-invocation runner settings,
//!   built once from command-line input and moved into the runner.

use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::address::Endpoint;
use crate::error::Result;

/// Environment variable prefix for ambient settings
pub const ENV_PREFIX: &str = "GRPC_HEALTH_";

/// Ambient configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive (trace, debug, info, warn, error, or `target=level` lists)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, colored when attached to a terminal
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
    /// Single-line human readable
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from defaults and `GRPC_HEALTH_*` environment variables
    ///
    /// `GRPC_HEALTH_LOG_LEVEL=debug` sets `log.level`.
    pub fn load() -> Result<Self> {
        Self::figment().extract().map_err(Into::into)
    }

    /// The Figment used by [`Config::load`], exposed for layering in tests
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("_"))
    }
}

/// Certificate and private key paths (PEM)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsFiles {
    /// Certificate chain
    pub cert_path: PathBuf,
    /// Private key
    pub key_path: PathBuf,
}

/// Server runner configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    endpoint: Endpoint,
    tls: Option<TlsFiles>,
}

impl ServerConfig {
    /// Plaintext server on the given address
    pub fn new(address: &str) -> Self {
        Self {
            endpoint: Endpoint::classify(address),
            tls: None,
        }
    }

    /// Build from optional certificate and key flags.
    ///
    /// TLS is only configured when both are given. A lone certificate or key
    /// is ignored with a warning and the server stays plaintext.
    pub fn from_flags(address: &str, cert_file: Option<PathBuf>, key_file: Option<PathBuf>) -> Self {
        let config = Self::new(address);
        match (cert_file, key_file) {
            (Some(cert_path), Some(key_path)) => config.with_tls(cert_path, key_path),
            (Some(cert_path), None) => {
                tracing::warn!(
                    cert_file = %cert_path.display(),
                    "Certificate file given without a key file, TLS disabled"
                );
                config
            }
            (None, Some(key_path)) => {
                tracing::warn!(
                    key_file = %key_path.display(),
                    "Key file given without a certificate file, TLS disabled"
                );
                config
            }
            (None, None) => config,
        }
    }

    /// Serve TLS with the given certificate and key
    pub fn with_tls(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.tls = Some(TlsFiles {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        });
        self
    }

    /// Listen endpoint
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Certificate files as supplied, regardless of endpoint kind
    pub fn requested_tls(&self) -> Option<&TlsFiles> {
        self.tls.as_ref()
    }

    /// Certificate files that will actually be used.
    ///
    /// Always `None` for Unix sockets.
    pub fn tls(&self) -> Option<&TlsFiles> {
        match self.endpoint {
            Endpoint::Tcp(_) => self.tls.as_ref(),
            Endpoint::Unix(_) => None,
        }
    }
}

/// Transport security used by the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClientTls {
    /// No TLS
    #[default]
    Plaintext,
    /// TLS, server certificate checked against the system trust roots
    Verified,
    /// TLS without server certificate verification.
    ///
    /// Insecure: any certificate is accepted, so the peer is not
    /// authenticated. Meant for self-signed test certificates.
    SkipVerify,
}

impl ClientTls {
    /// Map the `--tls` and `--insecure` flags.
    ///
    /// `insecure` only has an effect together with `tls`.
    pub fn from_flags(tls: bool, insecure: bool) -> Self {
        match (tls, insecure) {
            (true, true) => Self::SkipVerify,
            (true, false) => Self::Verified,
            (false, true) => {
                tracing::warn!("--insecure has no effect without --tls, using plaintext");
                Self::Plaintext
            }
            (false, false) => Self::Plaintext,
        }
    }
}

/// Client runner configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    endpoint: Endpoint,
    tls: ClientTls,
    service: String,
}

impl ClientConfig {
    /// Plaintext check of overall server health at the given address
    pub fn new(address: &str) -> Self {
        Self {
            endpoint: Endpoint::classify(address),
            tls: ClientTls::Plaintext,
            service: String::new(),
        }
    }

    /// Set transport security
    pub fn with_tls(mut self, tls: ClientTls) -> Self {
        self.tls = tls;
        self
    }

    /// Check a named service instead of the overall server health
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Dial endpoint
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Transport security
    pub fn tls(&self) -> ClientTls {
        self.tls
    }

    /// Service name sent in the request (empty for overall health)
    pub fn service(&self) -> &str {
        &self.service
    }
}
