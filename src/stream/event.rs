//! Event Type
//!
//! The immutable unit of data fanned out to consumers.

use serde::{Deserialize, Serialize};

/// Event type carried by the notice sent when a topic is closed
pub const TOPIC_CLOSED_EVENT: &str = "topic-closed";

/// A single event handed to the stream by a producer
///
/// Never mutated after it enters the intake queue; the dispatcher shares it
/// between sinks as `Arc<Event>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Optional identifier (SSE `id:` field)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Optional event type tag (SSE `event:` field)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Opaque payload
    pub data: String,
}

impl Event {
    /// Create an event with only a payload
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            id: None,
            event_type: None,
            data: data.into(),
        }
    }

    /// Set the event identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the event type tag
    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Notice delivered to former subscribers of a closed topic
    pub fn topic_closed(topic: &str) -> Self {
        Self::new(topic).with_type(TOPIC_CLOSED_EVENT)
    }

    /// Whether `id` and `event_type` are single-line values.
    ///
    /// Line breaks would split the field when framed onto a text stream.
    pub fn has_valid_fields(&self) -> bool {
        let single_line = |s: &Option<String>| {
            s.as_deref()
                .map(|v| !v.contains(['\n', '\r']))
                .unwrap_or(true)
        };
        single_line(&self.id) && single_line(&self.event_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let event = Event::new("hello").with_id("1").with_type("greeting");
        assert_eq!(event.data, "hello");
        assert_eq!(event.id.as_deref(), Some("1"));
        assert_eq!(event.event_type.as_deref(), Some("greeting"));
    }

    #[test]
    fn test_topic_closed_notice() {
        let event = Event::topic_closed("news");
        assert_eq!(event.data, "news");
        assert_eq!(event.event_type.as_deref(), Some(TOPIC_CLOSED_EVENT));
    }

    #[test]
    fn test_field_validation() {
        assert!(Event::new("multi\nline data is fine").has_valid_fields());
        assert!(!Event::new("x").with_id("a\nb").has_valid_fields());
        assert!(!Event::new("x").with_type("a\rb").has_valid_fields());
    }

    #[test]
    fn test_deserialize_minimal() {
        let event: Event = serde_json::from_str(r#"{"data": "payload"}"#).unwrap();
        assert_eq!(event, Event::new("payload"));
    }

    #[test]
    fn test_serialize_type_field() {
        let json = serde_json::to_string(&Event::new("x").with_type("update")).unwrap();
        assert!(json.contains("\"type\":\"update\""));
        assert!(!json.contains("\"id\""));
    }
}
