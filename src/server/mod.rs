//! HTTP surface of the gateway.
//!
//! Serves the embedded chat page and the `/ask` endpoint, and shuts down
//! gracefully on SIGINT/SIGTERM.

pub mod routes;

pub use routes::router;

use crate::agent::Agent;
use crate::error::{AgentError, AgentResult};
use crate::llm::CompletionService;
use crate::snapshot::CatalogSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

/// Upper bound on waiting for in-flight requests after a shutdown signal.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// Serve `agent` on `bind_addr` until a shutdown signal arrives, then close
/// the pool.
pub async fn serve<L, C>(agent: Arc<Agent<L, C>>, bind_addr: &str) -> AgentResult<()>
where
    L: CompletionService + 'static,
    C: CatalogSource + 'static,
{
    let listener = TcpListener::bind(bind_addr).await.map_err(|e| {
        AgentError::configuration(format!("failed to bind to {}: {}", bind_addr, e))
    })?;
    info!(address = %bind_addr, "Chat gateway listening");

    let app = router(agent.clone());

    let shutdown_notify = Arc::new(tokio::sync::Notify::new());
    let notify = shutdown_notify.clone();
    let shutdown_signal = async move {
        wait_for_signal().await;
        notify.notify_one();
    };

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
                return Err(AgentError::internal(format!("HTTP server error: {}", e)));
            }
            info!("HTTP server stopped");
        }
        _ = async {
            shutdown_notify.notified().await;
            info!(
                timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                "Waiting for in-flight requests (send signal again to force exit)..."
            );
            tokio::select! {
                _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                    warn!("Graceful shutdown timeout, forcing exit");
                }
                _ = wait_for_signal() => {
                    warn!("Received second signal, forcing immediate exit");
                }
            }
        } => {}
    }

    info!("Closing database connections");
    agent.pool().close().await;
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
