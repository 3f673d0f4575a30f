use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::{ServerConfig, ServerError, StorageLayout};

/// State shared by every request handler.
#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
    pub layout: StorageLayout,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let layout = config.layout();
        Self { config, layout }
    }
}

/// Builds the router of a node.
pub fn build_router(state: Arc<AppState>) -> Router {
    let chunks = ServeDir::new(&state.layout.uploads);

    Router::new()
        .route(
            "/upload",
            // Upload bodies are spooled to disk, never buffered.
            post(handlers::upload).layer(DefaultBodyLimit::disable()),
        )
        .route("/download", get(handlers::download))
        .route("/health", get(health_check))
        .nest_service("/chunks", chunks)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}

/// A chunkferry node.
pub struct TransferServer {
    state: Arc<AppState>,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl TransferServer {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(AppState::new(config)),
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
        })
    }

    /// Returns the local address the server is listening on.
    ///
    /// Only available once [`run`](Self::run) or [`run_on`](Self::run_on)
    /// has bound the socket.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Stops accepting connections and lets in-flight requests finish.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.state.config.listen_addr).await?;
        self.run_on(listener).await
    }

    /// Serves on an already bound listener until shutdown.
    pub async fn run_on(self: &Arc<Self>, listener: TcpListener) -> Result<(), ServerError> {
        self.state.layout.prepare()?;

        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(local_addr);
        tracing::info!(
            storage = %self.state.config.storage_root.display(),
            chunk_size = self.state.config.chunk_size,
            digest = %self.state.config.digest,
            "chunkferry listening on {local_addr}"
        );

        let cancel = self.cancel.clone();
        axum::serve(listener, build_router(Arc::clone(&self.state)))
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;

        tracing::info!("server shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(root: &std::path::Path) -> ServerConfig {
        ServerConfig {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            storage_root: root.to_path_buf(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn serves_health_and_shuts_down() {
        let dir = TempDir::new().unwrap();
        let server = TransferServer::new(config(dir.path()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let runner = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run_on(listener).await })
        };

        let body = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");
        assert_eq!(server.local_addr().await, Some(addr));
        assert!(dir.path().join("uploads").is_dir());

        server.shutdown();
        runner.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn run_binds_configured_address() {
        let dir = TempDir::new().unwrap();
        let server = TransferServer::new(config(dir.path()));
        let runner = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run().await })
        };

        let mut addr = None;
        for _ in 0..100 {
            addr = server.local_addr().await;
            if addr.is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let addr = addr.expect("server did not bind");
        assert_ne!(addr.port(), 0);

        server.shutdown();
        runner.await.unwrap().unwrap();
    }
}
