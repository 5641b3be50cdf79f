//! Address classification
//!
//! Decides whether a user-supplied address denotes a TCP endpoint or a
//! Unix-domain socket. Classification never fails: malformed TCP addresses
//! are passed through and rejected later by the transport.

use std::fmt;
use std::path::{Path, PathBuf};

/// Scheme prefixes accepted for Unix-domain sockets, longest first.
const UNIX_PREFIXES: [&str; 2] = ["unix://", "unix:"];

/// Host used when a TCP address omits it, or the target is a local socket.
const LOCAL_AUTHORITY: &str = "localhost";

/// A classified listen/dial target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `host:port` (or `:port`) passed to the TCP stack
    Tcp(String),
    /// Filesystem path of a Unix-domain socket
    Unix(PathBuf),
}

impl Endpoint {
    /// Classify a raw address string.
    ///
    /// `unix://...` and `unix:...` are Unix sockets with the marker stripped,
    /// as is anything starting with `/`. Everything else is TCP, unchanged.
    pub fn classify(address: &str) -> Self {
        for prefix in UNIX_PREFIXES {
            if let Some(path) = address.strip_prefix(prefix) {
                return Self::Unix(PathBuf::from(path));
            }
        }

        if address.starts_with('/') {
            return Self::Unix(PathBuf::from(address));
        }

        Self::Tcp(address.to_string())
    }

    /// Whether this endpoint is a Unix-domain socket
    pub fn is_unix(&self) -> bool {
        matches!(self, Self::Unix(_))
    }

    /// Socket path, for Unix endpoints
    pub fn socket_path(&self) -> Option<&Path> {
        match self {
            Self::Unix(path) => Some(path),
            Self::Tcp(_) => None,
        }
    }

    /// Address handed to the listener.
    ///
    /// `:port` means all interfaces.
    pub fn bind_address(&self) -> String {
        match self {
            Self::Tcp(addr) => with_default_host(addr, "0.0.0.0"),
            Self::Unix(path) => path.display().to_string(),
        }
    }

    /// Address handed to the dialer.
    ///
    /// `:port` means the local host.
    pub fn dial_address(&self) -> String {
        match self {
            Self::Tcp(addr) => with_default_host(addr, LOCAL_AUTHORITY),
            Self::Unix(path) => path.display().to_string(),
        }
    }

    /// Host part used for the HTTP/2 authority and TLS server name
    pub fn authority(&self) -> String {
        match self {
            Self::Tcp(addr) => {
                let host = match addr.rsplit_once(':') {
                    Some((host, _port)) => host,
                    None => addr.as_str(),
                };
                let host = host.trim_start_matches('[').trim_end_matches(']');
                if host.is_empty() {
                    LOCAL_AUTHORITY.to_string()
                } else {
                    host.to_string()
                }
            }
            Self::Unix(_) => LOCAL_AUTHORITY.to_string(),
        }
    }
}

impl From<&str> for Endpoint {
    fn from(address: &str) -> Self {
        Self::classify(address)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "{}", addr),
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

fn with_default_host(addr: &str, host: &str) -> String {
    if addr.starts_with(':') {
        format!("{}{}", host, addr)
    } else {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_unix_prefixes() {
        let cases = [
            ("unix:/tmp/grpc.sock", "/tmp/grpc.sock"),
            ("unix:///tmp/grpc.sock", "/tmp/grpc.sock"),
            ("unix:relative.sock", "relative.sock"),
            ("/var/run/health.sock", "/var/run/health.sock"),
        ];

        for (input, path) in cases {
            assert_eq!(
                Endpoint::classify(input),
                Endpoint::Unix(PathBuf::from(path)),
                "input: {}",
                input
            );
        }
    }

    #[test]
    fn test_classify_tcp_passthrough() {
        for input in [":50051", "localhost:50051", "127.0.0.1:0", "[::1]:8080", "invalid-address", ""] {
            assert_eq!(Endpoint::classify(input), Endpoint::Tcp(input.to_string()));
        }
    }

    #[test]
    fn test_unix_marker_is_case_sensitive() {
        assert!(!Endpoint::classify("UNIX:/tmp/a.sock").is_unix());
        assert!(!Endpoint::classify("tmp/a.sock").is_unix());
    }

    #[test]
    fn test_bind_and_dial_addresses() {
        let all_interfaces = Endpoint::classify(":50051");
        assert_eq!(all_interfaces.bind_address(), "0.0.0.0:50051");
        assert_eq!(all_interfaces.dial_address(), "localhost:50051");

        let explicit = Endpoint::classify("127.0.0.1:9000");
        assert_eq!(explicit.bind_address(), "127.0.0.1:9000");
        assert_eq!(explicit.dial_address(), "127.0.0.1:9000");

        let socket = Endpoint::classify("unix:/tmp/x.sock");
        assert_eq!(socket.dial_address(), "/tmp/x.sock");
        assert_eq!(socket.socket_path(), Some(Path::new("/tmp/x.sock")));
    }

    #[test]
    fn test_authority() {
        assert_eq!(Endpoint::classify("example.com:443").authority(), "example.com");
        assert_eq!(Endpoint::classify("[::1]:50051").authority(), "::1");
        assert_eq!(Endpoint::classify(":50051").authority(), "localhost");
        assert_eq!(Endpoint::classify("/tmp/a.sock").authority(), "localhost");
    }

    #[test]
    fn test_display() {
        assert_eq!(Endpoint::classify("unix:///tmp/a.sock").to_string(), "unix:/tmp/a.sock");
        assert_eq!(Endpoint::classify("localhost:1").to_string(), "localhost:1");
    }
}
