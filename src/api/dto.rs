//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! Incoming events deserialize straight into [`Event`](crate::stream::Event).

use serde::Serialize;

use crate::stream::{StatsSnapshot, StreamState};

/// Response for an event accepted into the intake queue
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    /// Status: "queued"
    pub status: String,
    /// Topic the event was published to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl QueuedResponse {
    pub fn new(topic: Option<String>) -> Self {
        Self {
            status: "queued".to_string(),
            topic,
        }
    }
}

/// Response for a closed topic
#[derive(Debug, Serialize)]
pub struct TopicClosedResponse {
    pub topic: String,
    /// Consumers that were subscribed when the topic closed
    pub subscribers: usize,
}

/// Full health status
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy", "starting", "draining" or "stopped"
    pub status: String,
    pub state: StreamState,
    pub consumers: usize,
    pub dispatch: StatsSnapshot,
    pub uptime_seconds: u64,
    pub version: String,
}
