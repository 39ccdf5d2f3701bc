use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::state::AppState;

/// `GET /health` -- liveness probe, always public.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /metrics` -- a snapshot of the observability surface described in
/// the design notes, as JSON.
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!(state.metrics.snapshot())))
}
