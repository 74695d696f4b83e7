//! Eventsource HTTP API
//!
//! Thin Server-Sent Events transport over the [`Stream`](crate::stream::Stream),
//! built with Axum.
//!
//! # Endpoints
//!
//! ## Consumers
//! - `GET /events` - SSE stream of broadcasts
//! - `GET /events/:topic` - SSE stream of broadcasts and one topic
//!
//! ## Producers
//! - `POST /api/v1/broadcast` - Queue an event for every consumer
//! - `POST /api/v1/publish/:topic` - Queue an event for a topic
//! - `DELETE /api/v1/topics/:topic` - Close a topic
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use eventsource::api::{serve, ApiConfig, AppState};
//! use eventsource::stream::{Stream, StreamConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stream = Arc::new(Stream::new(StreamConfig::default()));
//!     stream.start().await?;
//!
//!     let config = ApiConfig::default();
//!     serve(AppState::new(stream, config.clone()), &config).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod hook;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use hook::{ConnectHook, HeaderIdHook, CONSUMER_ID_HEADER};
pub use state::{ApiConfig, AppState};

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/broadcast", post(routes::publish::broadcast))
        .route("/publish/:topic", post(routes::publish::publish))
        .route("/topics/:topic", delete(routes::publish::close_topic));

    let event_routes = Router::new()
        .route("/", get(routes::events::stream_events))
        .route("/:topic", get(routes::events::stream_topic));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/events", event_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the API server
///
/// On Ctrl-C or SIGTERM the stream is drained and stopped first; open SSE
/// responses then end and the server finishes.
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let stream = Arc::clone(&state.stream);
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Eventsource API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            if let Err(e) = stream.shutdown().await {
                tracing::warn!(error = %e, "Stream shutdown skipped");
            }
        })
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Eventsource API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
