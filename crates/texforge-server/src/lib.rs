//! Texforge HTTP server.
//!
//! Exposes the compilation orchestrator over HTTP.
//!
//! # Architecture
//!
//! The server consists of:
//! - **Routes**: `POST /compile` and `GET /health` handlers
//! - **Protocol**: JSON request and response bodies
//!
//! All compilation state (format cache, workspaces, engine registry) lives
//! in the [`Orchestrator`] handed to [`serve`].

pub mod error;
pub mod protocol;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use texforge_core::Orchestrator;

pub use error::{ServerError, ServerResult};
pub use protocol::{CompileBody, CompileError, CompileSuccess, HealthResponse};
pub use routes::{AppState, create_router};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    /// Socket address to bind.
    pub fn addr(&self) -> ServerResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ServerError::InvalidAddress(format!("{}:{}", self.host, self.port)))
    }
}

/// Serve compile requests until Ctrl+C.
pub async fn serve(orchestrator: Orchestrator, config: ServerConfig) -> ServerResult<()> {
    let addr = config.addr()?;
    let app = create_router(Arc::new(AppState { orchestrator }));

    tracing::info!("Starting texforge server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
