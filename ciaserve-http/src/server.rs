use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use ciaserve_core::error::{Result, ShareError};
use ciaserve_core::{ChunkStreamer, ProgressObserver, ProgressRegistry, ShareConfig};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;

/// Everything a request handler may touch.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ProgressRegistry>,
    pub streamer: ChunkStreamer,
    /// Receives transfer progress; the registry unless replaced.
    pub observer: Arc<dyn ProgressObserver>,
    /// Flips to true when in-flight transfers should be dropped.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    pub fn new(cfg: &ShareConfig, registry: Arc<ProgressRegistry>) -> Self {
        // sender dropped at once: transfers never see a stop request
        let (_, shutdown) = watch::channel(false);
        Self {
            observer: registry.clone(),
            registry,
            streamer: ChunkStreamer::from_config(cfg),
            shutdown,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route("/progress", get(handlers::progress))
        .route("/{id}", get(handlers::download))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the listening socket. The only failure that is fatal to the process.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ShareError::Bind { addr, source })
}

/// Serve until `shutdown` resolves; in-flight downloads are drained.
/// Transfers still running when `AppState::shutdown` flips are cut off, so
/// a stalled client cannot hold the drain open.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "web server running");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
