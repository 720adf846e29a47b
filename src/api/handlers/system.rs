//! System endpoints: health check and cached scene snapshot.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    agents: usize,
    pending: usize,
}

/// `GET /health`: Service health, connected agents, in-flight commands.
///
/// Answers `503` with status `"degraded"` if the relay hub has stopped.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (code, status, agents, pending) = match state.relay.status().await {
        Ok(s) => (StatusCode::OK, "healthy", s.agents, s.pending),
        Err(err) => {
            tracing::error!(error = %err, "health check could not reach relay hub");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", 0, 0)
        }
    };
    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            agents,
            pending,
        }),
    )
}

/// `GET /scene`: Last scene snapshot reported by an agent.
pub async fn scene_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.relay.status().await {
        Ok(status) => (StatusCode::OK, Json(status.snapshot)).into_response(),
        Err(err) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response(),
    }
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/scene", get(scene_handler))
}
