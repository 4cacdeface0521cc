//! HTTP server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::auth::AccessGate;
use crate::config::Config;
use crate::router::{build_router, AppState};

/// A bound, not yet running, HTTP server.
pub struct DriveServer {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
}

impl DriveServer {
    /// Bind to `server.bind_addr` and build the router from `config`.
    ///
    /// Binding to port 0 picks a free port; see [`local_addr`](Self::local_addr).
    pub async fn bind(config: &Config) -> Result<Self> {
        let addr: SocketAddr = config
            .server
            .bind_addr
            .parse()
            .with_context(|| format!("Invalid bind address: {}", config.server.bind_addr))?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        let local_addr = listener.local_addr().context("Failed to read local address")?;

        let gate = AccessGate::from_config(&config.auth);
        if !gate.is_enabled() {
            warn!("Access gate disabled: auth.username or auth.password_sha256 is empty");
        }

        if !config.storage.root.is_dir() {
            warn!(root = ?config.storage.root, "Storage root does not exist yet");
        }

        let router = build_router(AppState::new(config), Arc::new(gate));

        Ok(Self {
            listener,
            router,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` is cancelled, then drain open connections.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        info!(addr = %self.local_addr, "Listening");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .context("HTTP server failed")?;

        info!("Server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> Config {
        let mut config = Config::default();
        config.server.bind_addr = "127.0.0.1:0".to_string();
        config
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = DriveServer::bind(&local_config()).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
        assert!(server.local_addr().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_bind_invalid_addr() {
        let mut config = local_config();
        config.server.bind_addr = "not an address".to_string();
        assert!(DriveServer::bind(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let server = DriveServer::bind(&local_config()).await.unwrap();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server.run(shutdown.clone()));

        shutdown.cancel();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
