//! Gate HTTP server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::router::{AppState, create_router};
use crate::cluster::KubeCluster;
use crate::config::Config;
use crate::gate::AuthGate;
use crate::{Error, Result};

/// Gate server
pub struct Server {
    config: Config,
    gate: AuthGate,
}

impl Server {
    /// Create a server backed by the configured Kubernetes API
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let cluster = KubeCluster::from_config(&config.cluster)?;
        info!(api_server = %cluster.api_server(), "Cluster API client ready");
        let gate = AuthGate::with_config(Arc::new(cluster.clone()), Arc::new(cluster), &config);
        Ok(Self::with_gate(config, gate))
    }

    /// Create a server around an existing gate
    #[must_use]
    pub fn with_gate(config: Config, gate: AuthGate) -> Self {
        Self { config, gate }
    }

    /// Run until Ctrl-C or SIGTERM
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let state = Arc::new(AppState { gate: self.gate });
        let app = create_router(state, self.config.server.request_timeout);
        let listener = TcpListener::bind(addr).await?;

        info!(
            host = %self.config.server.host,
            port = self.config.server.port,
            probe = ?self.config.probe.selection,
            "Listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

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
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
