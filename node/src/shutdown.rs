//! Graceful shutdown for the node's background loops and the RPC server.
//!
//! One `tokio::sync::broadcast` channel fans a single stop signal out to
//! every subscriber; an OS signal or [`ShutdownController::shutdown`]
//! fires it.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tokio::sync::broadcast;

/// Subscribers `select!` on their receiver next to their interval tick.
/// Triggering is sticky: a loop subscribing late can still check
/// [`is_triggered`](Self::is_triggered).
pub struct ShutdownController {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the stop signal. Only the first call broadcasts.
    pub fn shutdown(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            let receivers = self.tx.send(()).unwrap_or(0);
            tracing::debug!(receivers, "shutdown broadcast");
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Block until SIGINT or SIGTERM, then fire the stop signal.
    pub async fn wait_for_signal(&self) {
        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting on SIGINT only");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = signal::ctrl_c() => tracing::info!("SIGINT received"),
            _ = terminate => tracing::info!("SIGTERM received"),
        }
        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
