//! Consumer Sinks
//!
//! A [`Sink`] is the delivery endpoint for one consumer. The transport layer
//! supplies it; the dispatcher only ever calls [`Sink::deliver`].

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::event::Event;

/// Outcome of a single delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// The sink accepted the event
    Delivered,
    /// The consumer is gone; it will be unregistered
    Closed,
}

impl DeliveryStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, DeliveryStatus::Closed)
    }
}

/// Delivery endpoint for one consumer
///
/// Implementations must be safe to call concurrently for different consumers
/// and must return in bounded time: a hung sink stalls the delivery pass it
/// belongs to.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, event: Arc<Event>) -> DeliveryStatus;
}

/// Unique identifier for a registered consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(Uuid);

impl ConsumerId {
    /// Mint a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConsumerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for ConsumerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A consumer: one identity bound to one sink
///
/// Cloning is cheap and keeps the same identity. Two consumers are equal
/// when their ids are equal, regardless of the sink value.
#[derive(Clone)]
pub struct Consumer {
    id: ConsumerId,
    sink: Arc<dyn Sink>,
}

impl Consumer {
    /// Bind a sink to a freshly minted identity
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self::with_id(ConsumerId::new(), sink)
    }

    /// Bind a sink to a caller-chosen identity (e.g. from a connection hook)
    pub fn with_id(id: ConsumerId, sink: Arc<dyn Sink>) -> Self {
        Self { id, sink }
    }

    pub fn id(&self) -> ConsumerId {
        self.id
    }

    pub fn sink(&self) -> &Arc<dyn Sink> {
        &self.sink
    }

    /// Whether this consumer is bound to exactly `sink` (pointer identity)
    pub fn has_sink(&self, sink: &Arc<dyn Sink>) -> bool {
        Arc::ptr_eq(&self.sink, sink)
    }

    pub(crate) async fn deliver(&self, event: Arc<Event>) -> DeliveryStatus {
        self.sink.deliver(event).await
    }
}

impl PartialEq for Consumer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Consumer {}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer").field("id", &self.id).finish()
    }
}

/// Sink backed by a bounded channel
///
/// The receiving half lives with the transport (e.g. an SSE response body).
/// A dropped receiver, or a send that cannot complete within the timeout,
/// reports [`DeliveryStatus::Closed`].
pub struct ChannelSink {
    sender: mpsc::Sender<Arc<Event>>,
    send_timeout: Duration,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<Arc<Event>>, send_timeout: Duration) -> Self {
        Self {
            sender,
            send_timeout,
        }
    }

    /// Create a sink together with its receiving half
    pub fn channel(
        capacity: usize,
        send_timeout: Duration,
    ) -> (Self, mpsc::Receiver<Arc<Event>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx, send_timeout), rx)
    }
}

#[async_trait]
impl Sink for ChannelSink {
    async fn deliver(&self, event: Arc<Event>) -> DeliveryStatus {
        match tokio::time::timeout(self.send_timeout, self.sender.send(event)).await {
            Ok(Ok(())) => DeliveryStatus::Delivered,
            Ok(Err(_)) => DeliveryStatus::Closed,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.send_timeout.as_millis() as u64,
                    "Consumer too slow, dropping it"
                );
                DeliveryStatus::Closed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::channel(4, Duration::from_secs(1));

        let status = sink.deliver(Arc::new(Event::new("a"))).await;
        assert_eq!(status, DeliveryStatus::Delivered);
        assert_eq!(rx.try_recv().unwrap().data, "a");
    }

    #[tokio::test]
    async fn test_channel_sink_closed_receiver() {
        let (sink, rx) = ChannelSink::channel(4, Duration::from_secs(1));
        drop(rx);

        let status = sink.deliver(Arc::new(Event::new("a"))).await;
        assert!(status.is_closed());
    }

    #[tokio::test]
    async fn test_channel_sink_slow_consumer_times_out() {
        let (sink, _rx) = ChannelSink::channel(1, Duration::from_millis(20));

        assert_eq!(
            sink.deliver(Arc::new(Event::new("fills buffer"))).await,
            DeliveryStatus::Delivered
        );
        assert!(sink.deliver(Arc::new(Event::new("blocked"))).await.is_closed());
    }

    #[test]
    fn test_consumer_equality_is_by_id() {
        let (a, _rx_a) = ChannelSink::channel(1, Duration::from_secs(1));
        let (b, _rx_b) = ChannelSink::channel(1, Duration::from_secs(1));
        let id = ConsumerId::new();

        let first = Consumer::with_id(id, Arc::new(a));
        let second = Consumer::with_id(id, Arc::new(b));
        assert_eq!(first, second);
        assert_ne!(first, Consumer::new(Arc::clone(first.sink())));

        assert!(first.has_sink(first.clone().sink()));
        assert!(!first.has_sink(second.sink()));
    }

    #[test]
    fn test_consumer_id_parse() {
        let id = ConsumerId::new();
        let parsed: ConsumerId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<ConsumerId>().is_err());
    }
}
