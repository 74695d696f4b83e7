//! Consumer Registry
//!
//! Thread-safe membership and topic-interest storage. All access goes through
//! a single `RwLock`; delivery works on copied snapshots so a slow sink never
//! holds the lock.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::sink::{Consumer, ConsumerId, Sink};

/// Registry record for one consumer
#[derive(Debug, Clone)]
pub struct ConsumerHandle {
    consumer: Consumer,
    topics: HashSet<String>,
}

impl ConsumerHandle {
    fn new(consumer: Consumer) -> Self {
        Self {
            consumer,
            topics: HashSet::new(),
        }
    }

    pub fn consumer(&self) -> &Consumer {
        &self.consumer
    }

    pub fn id(&self) -> ConsumerId {
        self.consumer.id()
    }

    /// Topics this consumer is subscribed to
    pub fn topics(&self) -> &HashSet<String> {
        &self.topics
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.topics.contains(topic)
    }
}

/// The set of currently registered consumers
#[derive(Debug, Default)]
pub struct Registry {
    /// ConsumerId → ConsumerHandle
    consumers: RwLock<HashMap<ConsumerId, ConsumerHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer
    ///
    /// Idempotent: an already registered id keeps its handle and topics.
    /// Returns a copy of the handle as stored.
    pub async fn register(&self, consumer: &Consumer) -> ConsumerHandle {
        let mut consumers = self.consumers.write().await;
        let handle = consumers.entry(consumer.id()).or_insert_with(|| {
            tracing::info!(consumer_id = %consumer.id(), "Consumer registered");
            ConsumerHandle::new(consumer.clone())
        });
        handle.clone()
    }

    /// Register a consumer only if its id is free
    ///
    /// Optionally subscribes it to `topic` under the same write lock.
    /// Returns `None` when the id is already bound to a consumer; the stored
    /// entry is left untouched.
    pub async fn register_exclusive(
        &self,
        consumer: &Consumer,
        topic: Option<&str>,
    ) -> Option<ConsumerHandle> {
        let mut consumers = self.consumers.write().await;
        match consumers.entry(consumer.id()) {
            Entry::Occupied(_) => {
                tracing::debug!(consumer_id = %consumer.id(), "Consumer id already bound");
                None
            }
            Entry::Vacant(slot) => {
                let mut handle = ConsumerHandle::new(consumer.clone());
                if let Some(topic) = topic {
                    handle.topics.insert(topic.to_string());
                }
                tracing::info!(consumer_id = %consumer.id(), topic = ?topic, "Consumer registered");
                Some(slot.insert(handle).clone())
            }
        }
    }

    /// Look up a consumer's handle
    pub async fn lookup(&self, id: ConsumerId) -> Option<ConsumerHandle> {
        self.consumers.read().await.get(&id).cloned()
    }

    /// Remove a consumer; returns false if it was not registered
    pub async fn unregister(&self, id: ConsumerId) -> bool {
        let removed = self.consumers.write().await.remove(&id).is_some();
        if removed {
            tracing::info!(consumer_id = %id, "Consumer unregistered");
        } else {
            tracing::debug!(consumer_id = %id, "Unregister ignored, unknown consumer");
        }
        removed
    }

    /// Remove a consumer only while `id` is still bound to `sink`
    ///
    /// An id that has since been rebound to another sink is kept. Returns
    /// false if nothing was removed.
    pub async fn unregister_if(&self, id: ConsumerId, sink: &Arc<dyn Sink>) -> bool {
        let mut consumers = self.consumers.write().await;
        let bound = consumers
            .get(&id)
            .is_some_and(|handle| handle.consumer.has_sink(sink));

        if !bound {
            tracing::debug!(consumer_id = %id, "Unregister ignored, sink no longer bound");
            return false;
        }
        consumers.remove(&id);
        tracing::info!(consumer_id = %id, "Consumer unregistered");
        true
    }

    /// Subscribe a consumer to a topic, registering it first if needed
    pub async fn subscribe(&self, consumer: &Consumer, topic: &str) {
        let mut consumers = self.consumers.write().await;
        let handle = consumers.entry(consumer.id()).or_insert_with(|| {
            tracing::info!(consumer_id = %consumer.id(), "Consumer registered");
            ConsumerHandle::new(consumer.clone())
        });

        if handle.topics.insert(topic.to_string()) {
            tracing::debug!(consumer_id = %consumer.id(), topic = %topic, "Subscribed to topic");
        }
    }

    /// Clear a topic from a consumer's interest set
    ///
    /// The consumer stays registered. Returns false if the consumer is
    /// unknown or was not subscribed.
    pub async fn unsubscribe(&self, id: ConsumerId, topic: &str) -> bool {
        let mut consumers = self.consumers.write().await;
        let removed = consumers
            .get_mut(&id)
            .map(|handle| handle.topics.remove(topic))
            .unwrap_or(false);

        if removed {
            tracing::debug!(consumer_id = %id, topic = %topic, "Unsubscribed from topic");
        }
        removed
    }

    /// Clear a topic from every consumer under one write lock
    ///
    /// Returns the consumers that were subscribed.
    pub async fn clear_topic(&self, topic: &str) -> Vec<ConsumerId> {
        let mut consumers = self.consumers.write().await;
        consumers
            .values_mut()
            .filter_map(|handle| handle.topics.remove(topic).then(|| handle.id()))
            .collect()
    }

    /// Point-in-time copy of every registered consumer
    pub async fn snapshot_for_broadcast(&self) -> Vec<Consumer> {
        self.consumers
            .read()
            .await
            .values()
            .map(|handle| handle.consumer.clone())
            .collect()
    }

    /// Point-in-time copy of the consumers subscribed to `topic`
    pub async fn snapshot_for_topic(&self, topic: &str) -> Vec<Consumer> {
        self.consumers
            .read()
            .await
            .values()
            .filter(|handle| handle.is_subscribed(topic))
            .map(|handle| handle.consumer.clone())
            .collect()
    }

    /// Point-in-time copy of the given consumers that are still registered
    pub async fn snapshot_of(&self, ids: &[ConsumerId]) -> Vec<Consumer> {
        let consumers = self.consumers.read().await;
        ids.iter()
            .filter_map(|id| consumers.get(id))
            .map(|handle| handle.consumer.clone())
            .collect()
    }

    /// Number of registered consumers
    pub async fn len(&self) -> usize {
        self.consumers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.consumers.read().await.is_empty()
    }

    /// Number of consumers subscribed to a topic
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.consumers
            .read()
            .await
            .values()
            .filter(|handle| handle.is_subscribed(topic))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::sink::ChannelSink;
    use std::sync::Arc;
    use std::time::Duration;

    fn consumer() -> Consumer {
        let (sink, _rx) = ChannelSink::channel(1, Duration::from_secs(1));
        Consumer::new(Arc::new(sink))
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let registry = Registry::new();
        let c = consumer();

        registry.register(&c).await;
        registry.subscribe(&c, "news").await;
        let handle = registry.register(&c).await;

        assert_eq!(registry.len().await, 1);
        assert!(handle.is_subscribed("news"));
    }

    #[tokio::test]
    async fn test_lookup() {
        let registry = Registry::new();
        let c = consumer();

        assert!(registry.lookup(c.id()).await.is_none());
        registry.register(&c).await;
        let handle = registry.lookup(c.id()).await.unwrap();
        assert_eq!(handle.id(), c.id());
        assert!(handle.topics().is_empty());
    }

    #[tokio::test]
    async fn test_unregister_unknown_is_noop() {
        let registry = Registry::new();
        let c = consumer();

        assert!(!registry.unregister(c.id()).await);
        registry.register(&c).await;
        assert!(registry.unregister(c.id()).await);
        assert!(!registry.unregister(c.id()).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_unregister_if_requires_bound_sink() {
        let registry = Registry::new();
        let old = consumer();
        let (sink, _rx) = ChannelSink::channel(1, Duration::from_secs(1));
        let rebound = Consumer::with_id(old.id(), Arc::new(sink));

        registry.register(&old).await;
        assert!(registry.unregister(old.id()).await);
        registry.register(&rebound).await;

        assert!(!registry.unregister_if(old.id(), old.sink()).await);
        let handle = registry.lookup(old.id()).await.unwrap();
        assert!(handle.consumer().has_sink(rebound.sink()));

        assert!(registry.unregister_if(rebound.id(), rebound.sink()).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_register_exclusive() {
        let registry = Registry::new();
        let first = consumer();
        let (sink, _rx) = ChannelSink::channel(1, Duration::from_secs(1));
        let second = Consumer::with_id(first.id(), Arc::new(sink));

        let handle = registry
            .register_exclusive(&first, Some("news"))
            .await
            .unwrap();
        assert!(handle.is_subscribed("news"));

        assert!(registry
            .register_exclusive(&second, Some("sports"))
            .await
            .is_none());
        let stored = registry.lookup(first.id()).await.unwrap();
        assert!(stored.consumer().has_sink(first.sink()));
        assert!(!stored.is_subscribed("sports"));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_subscribe_registers_unknown_consumer() {
        let registry = Registry::new();
        let c = consumer();

        registry.subscribe(&c, "news").await;

        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.subscriber_count("news").await, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_keeps_registration() {
        let registry = Registry::new();
        let c = consumer();

        registry.subscribe(&c, "news").await;
        assert!(registry.unsubscribe(c.id(), "news").await);

        assert_eq!(registry.subscriber_count("news").await, 0);
        assert_eq!(registry.snapshot_for_broadcast().await, vec![c.clone()]);
        assert!(!registry.unsubscribe(c.id(), "news").await);
        assert!(!registry.unsubscribe(ConsumerId::new(), "news").await);
    }

    #[tokio::test]
    async fn test_snapshots() {
        let registry = Registry::new();
        let a = consumer();
        let b = consumer();

        registry.register(&a).await;
        registry.register(&b).await;
        registry.subscribe(&a, "news").await;

        assert_eq!(registry.snapshot_for_broadcast().await.len(), 2);
        assert_eq!(registry.snapshot_for_topic("news").await, vec![a.clone()]);
        assert!(registry.snapshot_for_topic("sports").await.is_empty());

        let gone = ConsumerId::new();
        assert_eq!(registry.snapshot_of(&[b.id(), gone]).await, vec![b.clone()]);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached_from_live_set() {
        let registry = Registry::new();
        let a = consumer();
        registry.register(&a).await;

        let snapshot = registry.snapshot_for_broadcast().await;
        registry.unregister(a.id()).await;

        assert_eq!(snapshot.len(), 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_topic() {
        let registry = Registry::new();
        let a = consumer();
        let b = consumer();

        registry.subscribe(&a, "news").await;
        registry.subscribe(&a, "sports").await;
        registry.subscribe(&b, "news").await;

        let mut cleared = registry.clear_topic("news").await;
        cleared.sort();
        let mut expected = vec![a.id(), b.id()];
        expected.sort();

        assert_eq!(cleared, expected);
        assert_eq!(registry.subscriber_count("news").await, 0);
        assert_eq!(registry.subscriber_count("sports").await, 1);
        assert_eq!(registry.len().await, 2);
    }
}
