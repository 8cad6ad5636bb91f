//! HTTP gateway.
//!
//! Serves:
//! - `POST /api/chat`   — one conversational turn, `{ "output": … }`
//! - `GET /api/status`  — returns `{ "status": "ok" }`
//! - `GET /api/health`  — version, uptime and live session count
//!
//! CORS is wide open: any origin, method and header.

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::orchestrator::Orchestrator;

/// Handle returned by [`start_gateway`].
pub struct Gateway {
    /// Server task handle.  Completes once the shutdown token fires
    /// and in-flight requests have drained.
    pub handle: JoinHandle<()>,
    /// The address the server is actually listening on.
    pub addr: SocketAddr,
}

/// Shared state injected into axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub(crate) orchestrator: Arc<Orchestrator>,
    pub(crate) started: std::time::Instant,
    pub(crate) started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            started: std::time::Instant::now(),
            started_at: Utc::now(),
        }
    }
}

/// Build the router for `state`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_router = Router::new()
        .route("/chat", post(handlers::chat::api_chat))
        .route("/status", get(handlers::health::status_handler))
        .route("/health", get(handlers::health::api_health));

    Router::new()
        .nest("/api", api_router)
        .with_state(state)
        .layer(cors)
}

/// Start the gateway on `addr` (port 0 picks an ephemeral port).
///
/// The server shuts down gracefully when `shutdown` is cancelled.
pub async fn start_gateway(
    addr: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<Gateway> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await });
        if let Err(e) = serve.await {
            error!("gateway server error: {e}");
        }
        info!("gateway stopped");
    });

    info!(%bound_addr, "gateway started");

    Ok(Gateway {
        handle,
        addr: bound_addr,
    })
}
