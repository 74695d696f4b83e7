//! Producer Routes
//!
//! Endpoints producers use to push events into the stream.
//!
//! - POST /api/v1/broadcast - Event to every consumer
//! - POST /api/v1/publish/:topic - Event to one topic's subscribers
//! - DELETE /api/v1/topics/:topic - Close a topic

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{QueuedResponse, TopicClosedResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::stream::Event;

/// POST /api/v1/broadcast
pub async fn broadcast(
    State(state): State<Arc<AppState>>,
    Json(event): Json<Event>,
) -> ApiResult<(StatusCode, Json<QueuedResponse>)> {
    validate_event(&event)?;
    state.stream.broadcast(event).await?;

    Ok((StatusCode::ACCEPTED, Json(QueuedResponse::new(None))))
}

/// POST /api/v1/publish/:topic
pub async fn publish(
    State(state): State<Arc<AppState>>,
    Path(topic): Path<String>,
    Json(event): Json<Event>,
) -> ApiResult<(StatusCode, Json<QueuedResponse>)> {
    validate_topic(&topic)?;
    validate_event(&event)?;
    state.stream.publish(topic.clone(), event).await?;

    Ok((StatusCode::ACCEPTED, Json(QueuedResponse::new(Some(topic)))))
}

/// DELETE /api/v1/topics/:topic
pub async fn close_topic(
    State(state): State<Arc<AppState>>,
    Path(topic): Path<String>,
) -> ApiResult<Json<TopicClosedResponse>> {
    validate_topic(&topic)?;
    let subscribers = state.stream.close_topic(&topic).await?;

    Ok(Json(TopicClosedResponse { topic, subscribers }))
}

fn validate_event(event: &Event) -> ApiResult<()> {
    if !event.has_valid_fields() {
        return Err(ApiError::Validation(
            "Event id and type must not contain line breaks".to_string(),
        ));
    }
    Ok(())
}

fn validate_topic(topic: &str) -> ApiResult<()> {
    if topic.trim().is_empty() {
        return Err(ApiError::Validation("Topic cannot be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_event() {
        assert!(validate_event(&Event::new("ok").with_id("42")).is_ok());
        assert!(validate_event(&Event::new("ok").with_id("4\n2")).is_err());
    }

    #[test]
    fn test_validate_topic() {
        assert!(validate_topic("news").is_ok());
        assert!(validate_topic("  ").is_err());
    }
}
