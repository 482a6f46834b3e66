use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{error, info};

use super::{
    services::{ping, submit_multirequest, submit_request},
    state::AppState,
};
use crate::config::Config;
use crate::engine::Engine;
use crate::session::SessionRegistry;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),
    #[error("invalid listen address: {0}")]
    Address(String),
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/request", post(submit_request))
        .route("/multirequest", post(submit_multirequest))
        .route("/ping", get(ping))
        .with_state(state)
        // Transparently decompress gzip request bodies at the middleware level
        .layer(RequestDecompressionLayer::new())
}

/// Run the bridge until a shutdown signal arrives. Used by the CLI.
pub async fn run(config: Config, engine: Arc<dyn Engine>) -> Result<(), BridgeError> {
    let handle = Bridge::start(config, engine).await?;
    shutdown_signal().await;
    handle.shutdown().await;
    Ok(())
}

/// Out-of-band management surface for an embedding process.
///
/// `start` binds the listener (port 0 picks an ephemeral loopback port) and
/// serves in a background task; the returned [`BridgeHandle`] reports the
/// bound address, stops the listener, and destroys sessions. All handle
/// operations are safe to call concurrently with in-flight requests.
pub struct Bridge;

impl Bridge {
    pub async fn start(
        config: Config,
        engine: Arc<dyn Engine>,
    ) -> Result<BridgeHandle, BridgeError> {
        let bind_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|_| {
                BridgeError::Address(format!(
                    "{}:{}",
                    config.server.host, config.server.port
                ))
            })?;

        let state = AppState::new(config, engine);
        let sessions = state.sessions.clone();
        let app = build_router(state);

        let listener = TcpListener::bind(bind_addr).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "relaybox listening");

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.changed().await;
            };
            if let Err(err) = axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %err, "bridge server exited with error");
            }
        });

        Ok(BridgeHandle {
            addr,
            shutdown: shutdown_tx,
            sessions,
            task,
        })
    }
}

pub struct BridgeHandle {
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    sessions: Arc<SessionRegistry>,
    task: JoinHandle<()>,
}

impl BridgeHandle {
    /// The address actually bound, with any ephemeral port resolved.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop listening and wait for in-flight requests to drain.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
        info!("relaybox stopped");
    }

    /// Destroy one engine session. Returns whether it existed.
    pub fn destroy_session(&self, id: &str) -> bool {
        self.sessions.remove(id)
    }

    /// Destroy every engine session. Returns how many were destroyed.
    pub fn destroy_all_sessions(&self) -> usize {
        self.sessions.clear()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
