use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use verigpt_core::QueryService;
use verigpt_index::IndexHandle;
use verigpt_llm::any::AnyProvider;
use verigpt_memory::CorpusLoader;

use crate::error::GatewayError;
use crate::router::build_router;

/// Shared request state. Everything is built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<QueryService<AnyProvider>>,
    pub corpus: Arc<CorpusLoader>,
    pub index: IndexHandle,
    pub index_path: Arc<PathBuf>,
    pub started_at: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(
        service: Arc<QueryService<AnyProvider>>,
        corpus: Arc<CorpusLoader>,
        index_path: PathBuf,
    ) -> Self {
        Self {
            index: service.index().clone(),
            service,
            corpus,
            index_path: Arc::new(index_path),
            started_at: Instant::now(),
        }
    }
}

pub struct GatewayServer {
    addr: SocketAddr,
    max_body_size: usize,
    state: AppState,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(bind: &str, port: u16, state: AppState, shutdown_rx: watch::Receiver<bool>) -> Self {
        let addr = match format!("{bind}:{port}").parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(e) => {
                tracing::warn!("invalid bind address '{bind}' ({e}), using loopback");
                SocketAddr::from(([127, 0, 0, 1], port))
            }
        };
        if addr.ip().is_unspecified() {
            tracing::warn!(%addr, "gateway reachable from other hosts; it has no authentication");
        }

        Self {
            addr,
            max_body_size: 1_048_576,
            state,
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Start the HTTP server and run until the shutdown signal flips.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        let local = listener.local_addr().unwrap_or(self.addr);
        tracing::info!(addr = %local, "gateway listening");

        let app = build_router(self.state, self.max_body_size);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_requested(self.shutdown_rx))
            .await
            .map_err(|e| GatewayError::Server(e.to_string()))
    }
}

/// Resolves once the flag turns `true`. A dropped sender never triggers shutdown.
async fn shutdown_requested(mut rx: watch::Receiver<bool>) {
    let sender_dropped = rx.wait_for(|stop| *stop).await.is_err();
    if sender_dropped {
        std::future::pending::<()>().await;
    }
    tracing::info!("gateway shutting down");
}
