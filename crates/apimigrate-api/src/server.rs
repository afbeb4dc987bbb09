use crate::{create_router, AppState};
use anyhow::Context;
use apimigrate_core::ConfigManager;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

pub struct Server {
    state: AppState,
    addr: SocketAddr,
}

impl Server {
    pub async fn new(addr: SocketAddr, config: Arc<ConfigManager>) -> anyhow::Result<Self> {
        let state = AppState::new(config).await?;

        match state.runner.recover_interrupted().await {
            Ok(0) => {}
            Ok(n) => info!("Recovered {} interrupted migration(s)", n),
            Err(e) => warn!("Could not recover interrupted migrations: {}", e),
        }

        Ok(Self { state, addr })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let router = create_router(self.state);

        info!("Starting Apigee migration API server on {}", self.addr);

        let listener = {
            let socket = if self.addr.is_ipv6() {
                tokio::net::TcpSocket::new_v6()
            } else {
                tokio::net::TcpSocket::new_v4()
            }
            .context("creating listener socket")?;

            // Reuse addr to improve rebind under restarts
            let _ = socket.set_reuseaddr(true);
            let _ = socket.set_keepalive(true);

            socket
                .bind(self.addr)
                .with_context(|| format!("binding {}", self.addr))?;
            socket.listen(1024)?
        };

        info!("Server listening on http://{}", self.addr);
        info!("  GET /health - Liveness and store check");
        info!("  GET /metrics - Prometheus metrics");
        info!("  GET /api/openapi.json - OpenAPI document");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("serving HTTP")?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {}", e);
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
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }

    // Give in-flight responses a moment; running migrations are failed as
    // interrupted on the next start.
    tokio::time::sleep(Duration::from_millis(100)).await;
}
