//! Serve command handler.

use crate::server::{router, AppState};
use clap::Args;
use insight_agent::AgentOrchestrator;
use insight_core::{config::AppConfig, AppResult};
use std::net::SocketAddr;
use std::sync::Arc;

/// Run the HTTP server
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8000")]
    pub addr: SocketAddr,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let orchestrator = AgentOrchestrator::connect(config).await?;
        let state = AppState {
            orchestrator: Arc::new(orchestrator),
            dataset_dir: config.dataset_dir(),
        };

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("Listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router(state))
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shut down");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
