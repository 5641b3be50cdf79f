//! Remote peer identity captured while dialing

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio_rustls::rustls::pki_types::CertificateDer;
use x509_parser::prelude::{FromDer, X509Certificate};

/// Summary of the certificate presented by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCertificate {
    /// Subject distinguished name
    pub subject: String,
    /// Issuer distinguished name
    pub issuer: String,
    /// Start of the validity window
    pub not_before: DateTime<Utc>,
    /// End of the validity window
    pub not_after: DateTime<Utc>,
}

impl PeerCertificate {
    /// Parse the leaf certificate. Returns `None` if it is not valid X.509.
    pub fn from_der(der: &CertificateDer<'_>) -> Option<Self> {
        let (_, cert) = X509Certificate::from_der(der.as_ref()).ok()?;
        let validity = cert.validity();

        Some(Self {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            not_before: DateTime::from_timestamp(validity.not_before.timestamp(), 0)?,
            not_after: DateTime::from_timestamp(validity.not_after.timestamp(), 0)?,
        })
    }
}

/// Remote address and, over TLS, the server certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    /// `ip:port` for TCP, the socket path for Unix sockets
    pub address: String,
    /// Leaf certificate, when the connection is TLS and one was presented
    pub certificate: Option<PeerCertificate>,
}

/// Slot written by the connector and read after the call
#[derive(Debug, Clone, Default)]
pub(crate) struct PeerSlot(Arc<Mutex<Option<PeerInfo>>>);

impl PeerSlot {
    pub(crate) fn set(&self, peer: PeerInfo) {
        let mut slot = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(peer);
    }

    pub(crate) fn get(&self) -> Option<PeerInfo> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
