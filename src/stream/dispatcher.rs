//! Event Dispatcher
//!
//! Consumes the intake queue one item at a time and fans each event out to
//! the matching consumers. The target set is snapshotted when the item is
//! dequeued, not when it was enqueued, so a subscription made between
//! `publish` and dispatch is honoured on a best-effort basis.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::event::Event;
use super::registry::Registry;
use super::sink::{Consumer, ConsumerId, DeliveryStatus};

/// An item on the intake queue
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// Deliver to every registered consumer
    Broadcast(Arc<Event>),
    /// Deliver to consumers subscribed to `topic` at dispatch time
    Publish { topic: String, event: Arc<Event> },
    /// Deliver to the listed consumers that are still registered
    Direct {
        targets: Vec<ConsumerId>,
        event: Arc<Event>,
    },
}

impl Dispatch {
    pub fn event(&self) -> &Arc<Event> {
        match self {
            Dispatch::Broadcast(event) => event,
            Dispatch::Publish { event, .. } => event,
            Dispatch::Direct { event, .. } => event,
        }
    }
}

/// How one event is handed to its matched sinks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// One sink after another; a slow sink delays the rest of the pass
    Sequential,
    /// All sinks at once; the pass takes as long as the slowest sink
    #[default]
    Concurrent,
}

/// Dispatch counters
#[derive(Debug, Default)]
pub struct DispatchStats {
    events: AtomicU64,
    attempted: AtomicU64,
    delivered: AtomicU64,
    disconnected: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Events taken off the intake queue
    pub events: u64,
    /// Sink deliveries attempted
    pub attempted: u64,
    /// Sink deliveries accepted
    pub delivered: u64,
    /// Consumers dropped because their sink reported closed
    pub disconnected: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events: self.events.load(Ordering::Relaxed),
            attempted: self.attempted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            disconnected: self.disconnected.load(Ordering::Relaxed),
        }
    }
}

/// Fans events out to the registry
pub struct Dispatcher {
    registry: Arc<Registry>,
    stats: Arc<DispatchStats>,
    mode: DeliveryMode,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, stats: Arc<DispatchStats>, mode: DeliveryMode) -> Self {
        Self {
            registry,
            stats,
            mode,
        }
    }

    /// Processing loop
    ///
    /// Returns once the intake channel is closed and fully drained.
    pub async fn run(self, mut intake: mpsc::Receiver<Dispatch>) {
        tracing::debug!(mode = ?self.mode, "Dispatcher started");

        while let Some(item) = intake.recv().await {
            self.dispatch(item).await;
        }

        tracing::debug!("Dispatcher drained, exiting");
    }

    /// Deliver one item to its recipients
    pub async fn dispatch(&self, item: Dispatch) {
        self.stats.events.fetch_add(1, Ordering::Relaxed);

        let recipients = match &item {
            Dispatch::Broadcast(_) => self.registry.snapshot_for_broadcast().await,
            Dispatch::Publish { topic, .. } => self.registry.snapshot_for_topic(topic).await,
            Dispatch::Direct { targets, .. } => self.registry.snapshot_of(targets).await,
        };

        if recipients.is_empty() {
            if let Dispatch::Publish { topic, .. } = &item {
                tracing::trace!(topic = %topic, "No subscribers for topic");
            }
            return;
        }

        let closed = self.deliver(&recipients, item.event()).await;

        for consumer in closed {
            self.stats.disconnected.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(consumer_id = %consumer.id(), "Sink closed during delivery");
            // The id may already be bound to a new sink.
            self.registry
                .unregister_if(consumer.id(), consumer.sink())
                .await;
        }
    }

    /// Returns the consumers whose sink reported closed
    async fn deliver<'a>(
        &self,
        recipients: &'a [Consumer],
        event: &Arc<Event>,
    ) -> Vec<&'a Consumer> {
        self.stats
            .attempted
            .fetch_add(recipients.len() as u64, Ordering::Relaxed);

        let statuses: Vec<(&Consumer, DeliveryStatus)> = match self.mode {
            DeliveryMode::Sequential => {
                let mut statuses = Vec::with_capacity(recipients.len());
                for consumer in recipients {
                    let status = consumer.deliver(Arc::clone(event)).await;
                    statuses.push((consumer, status));
                }
                statuses
            }
            DeliveryMode::Concurrent => {
                join_all(recipients.iter().map(|consumer| async move {
                    (consumer, consumer.deliver(Arc::clone(event)).await)
                }))
                .await
            }
        };

        let mut closed = Vec::new();
        for (consumer, status) in statuses {
            match status {
                DeliveryStatus::Delivered => {
                    self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                }
                DeliveryStatus::Closed => closed.push(consumer),
            }
        }

        tracing::trace!(
            recipients = recipients.len(),
            closed = closed.len(),
            "Event dispatched"
        );
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::sink::ChannelSink;
    use std::time::Duration;

    fn channel_consumer() -> (Consumer, mpsc::Receiver<Arc<Event>>) {
        let (sink, rx) = ChannelSink::channel(16, Duration::from_secs(1));
        (Consumer::new(Arc::new(sink)), rx)
    }

    fn dispatcher(registry: &Arc<Registry>, mode: DeliveryMode) -> Dispatcher {
        Dispatcher::new(Arc::clone(registry), Arc::new(DispatchStats::default()), mode)
    }

    #[test]
    fn test_default_mode() {
        assert_eq!(DeliveryMode::default(), DeliveryMode::Concurrent);
    }

    #[tokio::test]
    async fn test_publish_filters_by_topic() {
        let registry = Arc::new(Registry::new());
        let (a, mut rx_a) = channel_consumer();
        let (b, mut rx_b) = channel_consumer();
        registry.subscribe(&a, "news").await;
        registry.register(&b).await;

        dispatcher(&registry, DeliveryMode::Sequential)
            .dispatch(Dispatch::Publish {
                topic: "news".to_string(),
                event: Arc::new(Event::new("e1")),
            })
            .await;

        assert_eq!(rx_a.try_recv().unwrap().data, "e1");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_sink_is_unregistered() {
        let registry = Arc::new(Registry::new());
        let (alive, mut rx_alive) = channel_consumer();
        let (gone, rx_gone) = channel_consumer();
        registry.register(&alive).await;
        registry.register(&gone).await;
        drop(rx_gone);

        let stats = Arc::new(DispatchStats::default());
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&stats),
            DeliveryMode::Concurrent,
        );
        dispatcher
            .dispatch(Dispatch::Broadcast(Arc::new(Event::new("e"))))
            .await;

        assert_eq!(rx_alive.try_recv().unwrap().data, "e");
        assert!(registry.lookup(gone.id()).await.is_none());
        assert!(registry.lookup(alive.id()).await.is_some());
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                events: 1,
                attempted: 2,
                delivered: 1,
                disconnected: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_direct_skips_unregistered_targets() {
        let registry = Arc::new(Registry::new());
        let (a, mut rx_a) = channel_consumer();
        let (b, mut rx_b) = channel_consumer();
        registry.register(&a).await;
        registry.register(&b).await;

        dispatcher(&registry, DeliveryMode::Concurrent)
            .dispatch(Dispatch::Direct {
                targets: vec![a.id(), ConsumerId::new()],
                event: Arc::new(Event::new("only a")),
            })
            .await;

        assert_eq!(rx_a.try_recv().unwrap().data, "only a");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_drains_in_order() {
        let registry = Arc::new(Registry::new());
        let (a, mut rx_a) = channel_consumer();
        registry.register(&a).await;

        let (tx, rx) = mpsc::channel(8);
        for i in 0..5 {
            tx.send(Dispatch::Broadcast(Arc::new(Event::new(i.to_string()))))
                .await
                .unwrap();
        }
        drop(tx);

        dispatcher(&registry, DeliveryMode::Sequential).run(rx).await;

        for i in 0..5 {
            assert_eq!(rx_a.try_recv().unwrap().data, i.to_string());
        }
        assert!(rx_a.try_recv().is_err());
    }
}
