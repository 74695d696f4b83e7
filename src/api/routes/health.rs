//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (stream is running)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;
use crate::stream::StreamState;

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 only while the dispatcher is running.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.stream.state() {
        StreamState::Running => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// GET /health
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let stream_state = state.stream.state();
    let status = match stream_state {
        StreamState::Created => "starting",
        StreamState::Running => "healthy",
        StreamState::ShuttingDown => "draining",
        StreamState::Stopped => "stopped",
    };

    Json(HealthResponse {
        status: status.to_string(),
        state: stream_state,
        consumers: state.stream.consumer_count().await,
        dispatch: state.stream.stats(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
