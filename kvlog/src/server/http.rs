//! HTTP server implementation for kvlog.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::signal;

use super::config::LogServerConfig;
use super::handlers::{AppState, handle_healthy, handle_metrics, handle_ready, handle_request};
use super::metrics::Metrics;
use super::middleware::InstrumentLayer;
use crate::{Error, Log, Result};

/// Builds the router with all routes and middleware.
pub fn router(log: Arc<Log>, metrics: Arc<Metrics>) -> Router {
    let state = AppState {
        log,
        metrics: metrics.clone(),
    };

    Router::new()
        .route("/api/v1/log", post(handle_request))
        .route("/metrics", get(handle_metrics))
        .route("/-/healthy", get(handle_healthy))
        .route("/-/ready", get(handle_ready))
        .layer(InstrumentLayer::new(metrics))
        .with_state(state)
}

/// HTTP server for the log service.
pub struct LogServer {
    log: Arc<Log>,
    config: LogServerConfig,
}

impl LogServer {
    /// Create a new log server.
    pub fn new(log: Arc<Log>, config: LogServerConfig) -> Self {
        Self { log, config }
    }

    /// Run the HTTP server until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<()> {
        let app = router(self.log, Arc::new(Metrics::new()));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        tracing::info!("Starting kvlog HTTP server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Internal(format!("failed to bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(format!("server error: {}", e)))?;

        tracing::info!("Server shut down gracefully");
        Ok(())
    }
}

/// Listen for SIGTERM (K8s pod termination) and SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
