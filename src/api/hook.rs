//! Connection Hook
//!
//! Called when a new SSE connection arrives, before the consumer is
//! registered. Decides the consumer's identity.

use axum::http::HeaderMap;

use crate::stream::ConsumerId;

/// Header a client may use to choose its own consumer id
pub const CONSUMER_ID_HEADER: &str = "x-consumer-id";

/// Assigns an identity to a connecting consumer
///
/// Any `Fn(&HeaderMap) -> ConsumerId` closure is a hook.
pub trait ConnectHook: Send + Sync {
    fn on_connect(&self, headers: &HeaderMap) -> ConsumerId;
}

impl<F> ConnectHook for F
where
    F: Fn(&HeaderMap) -> ConsumerId + Send + Sync,
{
    fn on_connect(&self, headers: &HeaderMap) -> ConsumerId {
        self(headers)
    }
}

/// Default hook: honours a UUID in `X-Consumer-Id`, otherwise mints one
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderIdHook;

impl ConnectHook for HeaderIdHook {
    fn on_connect(&self, headers: &HeaderMap) -> ConsumerId {
        headers
            .get(CONSUMER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or_default()
    }
}
