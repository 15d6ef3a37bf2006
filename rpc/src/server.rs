//! Axum-based RPC server.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::error::RpcError;
use crate::routes::router;
use crate::state::RpcState;

pub struct RpcServer {
    pub port: u16,
    pub with_metrics: bool,
    state: RpcState,
}

impl RpcServer {
    pub fn new(port: u16, with_metrics: bool, state: RpcState) -> Self {
        Self {
            port,
            with_metrics,
            state,
        }
    }

    /// Bind to `port` and serve until `shutdown` fires.
    pub async fn start(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), RpcError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RpcError::Server(format!("bind {addr}: {e}")))?;
        tracing::info!(%addr, metrics = self.with_metrics, "rpc server listening");

        let app = router(self.state, self.with_metrics);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await
            .map_err(|e| RpcError::Server(e.to_string()))?;

        tracing::info!("rpc server stopped");
        Ok(())
    }
}
