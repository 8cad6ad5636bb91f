use axum::{extract::State, response::IntoResponse, Json};

use super::super::AppState;

/// `GET /api/status`
pub(crate) async fn status_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `GET /api/health`
pub(crate) async fn api_health(State(state): State<AppState>) -> impl IntoResponse {
    let uptime_secs = state.started.elapsed().as_secs();

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime_secs,
        "started_at": state.started_at.to_rfc3339(),
        "sessions": state.orchestrator.sessions().len(),
    }))
}
