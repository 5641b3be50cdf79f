//! Cooperative shutdown
//!
//! A single [`CancellationToken`] is the stop signal for a server. The serve
//! loop watches it through [`GracefulStop::wait`], which reports the stop at
//! most once no matter how many times the token is cancelled or awaited.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Once-only graceful stop trigger bound to a cancellation token
#[derive(Debug, Clone)]
pub struct GracefulStop {
    token: CancellationToken,
    stopped: Arc<AtomicBool>,
}

impl GracefulStop {
    /// Watch the given token
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request the stop. Returns `true` only for the first caller.
    pub fn trigger(&self) -> bool {
        self.token.cancel();
        !self.stopped.swap(true, Ordering::AcqRel)
    }

    /// Resolve once the token is cancelled, logging the stop the first time
    pub async fn wait(self) {
        self.token.cancelled().await;
        if self.trigger() {
            tracing::info!("Stopping gRPC server");
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}

/// Cancel `token` when the process receives SIGINT or SIGTERM
pub fn cancel_on_signal(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown_signal() => token.cancel(),
            _ = token.cancelled() => {}
        }
    })
}
