//! Stream Hub
//!
//! The explicit, caller-owned event hub. It ties the registry, the intake
//! queue and the dispatcher task together and walks the lifecycle
//! `Created → Running → ShuttingDown → Stopped`.
//!
//! Registration calls mutate the registry directly, so a producer may
//! publish immediately after subscribing. Events go through the bounded
//! intake queue and are delivered by a single background task in FIFO
//! order.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;

use super::dispatcher::{DeliveryMode, Dispatch, DispatchStats, Dispatcher, StatsSnapshot};
use super::error::{StreamError, StreamResult};
use super::event::Event;
use super::registry::{ConsumerHandle, Registry};
use super::sink::{Consumer, ConsumerId};

/// Configuration for a stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Capacity of the intake queue; producers wait when it is full
    #[serde(default = "default_intake_capacity")]
    pub intake_capacity: usize,

    /// How one event is handed to its matched sinks
    #[serde(default)]
    pub delivery: DeliveryMode,

    /// Send a `topic-closed` notice to former subscribers on `close_topic`
    #[serde(default = "default_notify_topic_close")]
    pub notify_topic_close: bool,
}

fn default_intake_capacity() -> usize {
    1024
}

fn default_notify_topic_close() -> bool {
    true
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            intake_capacity: default_intake_capacity(),
            delivery: DeliveryMode::default(),
            notify_topic_close: default_notify_topic_close(),
        }
    }
}

/// Lifecycle state of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// Accepting registrations and queueing events; nothing delivered yet
    Created,
    /// Dispatcher task is delivering events
    Running,
    /// Intake closed, queued events draining
    ShuttingDown,
    /// Terminal
    Stopped,
}

/// Event distribution hub
pub struct Stream {
    registry: Arc<Registry>,
    stats: Arc<DispatchStats>,
    config: StreamConfig,
    /// Producer half of the intake queue; `None` once shutdown begins
    intake: RwLock<Option<mpsc::Sender<Dispatch>>>,
    /// Consumer half, held until the dispatcher takes it
    pending: Mutex<Option<mpsc::Receiver<Dispatch>>>,
    /// Dispatcher task
    worker: Mutex<Option<JoinHandle<()>>>,
    state: watch::Sender<StreamState>,
}

impl Stream {
    /// Create a stream in the `Created` state
    pub fn new(config: StreamConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.intake_capacity.max(1));
        let (state, _) = watch::channel(StreamState::Created);

        Self {
            registry: Arc::new(Registry::new()),
            stats: Arc::new(DispatchStats::default()),
            config,
            intake: RwLock::new(Some(tx)),
            pending: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
            state,
        }
    }

    /// Launch the dispatcher task
    ///
    /// Calling it again while running is a no-op.
    pub async fn start(&self) -> StreamResult<()> {
        // Serialises with the state change in `shutdown`.
        let _intake = self.intake.write().await;

        match self.state() {
            StreamState::Created => {}
            StreamState::Running => {
                tracing::debug!("Stream already running");
                return Ok(());
            }
            StreamState::ShuttingDown => return Err(StreamError::ShuttingDown),
            StreamState::Stopped => return Err(StreamError::AlreadyStopped),
        }

        let mut worker = self.worker.lock().await;
        if let Some(intake) = self.pending.lock().await.take() {
            *worker = Some(tokio::spawn(self.dispatcher().run(intake)));
        }
        self.state.send_replace(StreamState::Running);

        tracing::info!(
            intake_capacity = self.config.intake_capacity,
            delivery = ?self.config.delivery,
            "Stream started"
        );
        Ok(())
    }

    /// Close intake and wait until every queued event has been dispatched
    ///
    /// Consumers are not disconnected. If the stream was never started the
    /// queued events are drained on the caller's task.
    pub async fn shutdown(&self) -> StreamResult<()> {
        {
            let mut intake = self.intake.write().await;
            match self.state() {
                StreamState::Stopped => return Err(StreamError::AlreadyStopped),
                StreamState::ShuttingDown => {
                    drop(intake);
                    self.wait_stopped().await;
                    return Ok(());
                }
                StreamState::Created | StreamState::Running => {}
            }
            intake.take();
            self.state.send_replace(StreamState::ShuttingDown);
        }

        tracing::info!("Stream shutting down, draining intake");

        let worker = self.worker.lock().await.take();
        match worker {
            Some(handle) => {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Dispatcher task failed");
                }
            }
            None => {
                let pending = self.pending.lock().await.take();
                if let Some(intake) = pending {
                    self.dispatcher().run(intake).await;
                }
            }
        }

        self.state.send_replace(StreamState::Stopped);
        tracing::info!(stats = ?self.stats.snapshot(), "Stream stopped");
        Ok(())
    }

    /// Register a consumer for broadcasts
    ///
    /// Idempotent: registering the same id again keeps its topics.
    pub async fn register(&self, consumer: &Consumer) -> StreamResult<ConsumerHandle> {
        self.ensure_accepting()?;
        Ok(self.registry.register(consumer).await)
    }

    /// Register a consumer whose id must not already be bound
    ///
    /// The check and the insert happen under one registry lock. Returns
    /// `None` if another consumer holds the id.
    pub async fn register_exclusive(
        &self,
        consumer: &Consumer,
        topic: Option<&str>,
    ) -> StreamResult<Option<ConsumerHandle>> {
        self.ensure_accepting()?;
        Ok(self.registry.register_exclusive(consumer, topic).await)
    }

    /// Remove a consumer; unknown ids are ignored
    pub async fn unregister(&self, id: ConsumerId) -> StreamResult<()> {
        self.ensure_not_stopped()?;
        self.registry.unregister(id).await;
        Ok(())
    }

    /// Remove `consumer` only if its id is still bound to its sink
    pub async fn unregister_consumer(&self, consumer: &Consumer) -> StreamResult<bool> {
        self.ensure_not_stopped()?;
        Ok(self
            .registry
            .unregister_if(consumer.id(), consumer.sink())
            .await)
    }

    /// Subscribe a consumer to a topic, registering it if needed
    pub async fn subscribe(&self, consumer: &Consumer, topic: &str) -> StreamResult<()> {
        self.ensure_accepting()?;
        self.registry.subscribe(consumer, topic).await;
        Ok(())
    }

    /// Remove a topic from a consumer's interests; it still gets broadcasts
    pub async fn unsubscribe(&self, id: ConsumerId, topic: &str) -> StreamResult<()> {
        self.ensure_not_stopped()?;
        self.registry.unsubscribe(id, topic).await;
        Ok(())
    }

    /// Queue an event for every registered consumer
    pub async fn broadcast(&self, event: Event) -> StreamResult<()> {
        self.enqueue(Dispatch::Broadcast(Arc::new(event))).await
    }

    /// Queue an event for the subscribers of `topic`
    ///
    /// Subscribers are resolved when the event is dispatched, not now.
    pub async fn publish(&self, topic: impl Into<String>, event: Event) -> StreamResult<()> {
        self.enqueue(Dispatch::Publish {
            topic: topic.into(),
            event: Arc::new(event),
        })
        .await
    }

    /// Queue an event for a single registered consumer
    pub async fn send_to(&self, id: ConsumerId, event: Event) -> StreamResult<()> {
        self.ensure_not_stopped()?;
        if self.registry.lookup(id).await.is_none() {
            return Err(StreamError::UnknownConsumer(id));
        }
        self.enqueue(Dispatch::Direct {
            targets: vec![id],
            event: Arc::new(event),
        })
        .await
    }

    /// Unsubscribe every consumer from `topic`
    ///
    /// Consumers stay registered even when no topics remain. When enabled, a
    /// `topic-closed` notice is queued for the former subscribers; during
    /// shutdown the notice is skipped. Returns how many consumers were
    /// subscribed.
    pub async fn close_topic(&self, topic: &str) -> StreamResult<usize> {
        self.ensure_not_stopped()?;

        let former = self.registry.clear_topic(topic).await;
        let count = former.len();
        tracing::info!(topic = %topic, subscribers = count, "Topic closed");

        if self.config.notify_topic_close && count > 0 {
            let notice = Dispatch::Direct {
                targets: former,
                event: Arc::new(Event::topic_closed(topic)),
            };
            match self.enqueue(notice).await {
                Ok(()) => {}
                Err(StreamError::IntakeClosed) => {
                    tracing::debug!(topic = %topic, "Intake closed, topic notice skipped");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(count)
    }

    /// Look up a registered consumer
    pub async fn lookup(&self, id: ConsumerId) -> Option<ConsumerHandle> {
        self.registry.lookup(id).await
    }

    /// Current lifecycle state
    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    /// Receiver that observes lifecycle transitions
    pub fn watch_state(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn consumer_count(&self) -> usize {
        self.registry.len().await
    }

    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.registry.subscriber_count(topic).await
    }

    async fn enqueue(&self, item: Dispatch) -> StreamResult<()> {
        let sender = self.intake.read().await.clone();
        let Some(sender) = sender else {
            return Err(self.closed_error());
        };
        sender.send(item).await.map_err(|_| self.closed_error())
    }

    fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.stats),
            self.config.delivery,
        )
    }

    async fn wait_stopped(&self) {
        let mut state = self.state.subscribe();
        // The sender lives in `self`, so this only returns once stopped.
        let _ = state.wait_for(|s| *s == StreamState::Stopped).await;
    }

    fn closed_error(&self) -> StreamError {
        match self.state() {
            StreamState::Stopped => StreamError::AlreadyStopped,
            _ => StreamError::IntakeClosed,
        }
    }

    fn ensure_accepting(&self) -> StreamResult<()> {
        match self.state() {
            StreamState::Created | StreamState::Running => Ok(()),
            StreamState::ShuttingDown => Err(StreamError::ShuttingDown),
            StreamState::Stopped => Err(StreamError::AlreadyStopped),
        }
    }

    fn ensure_not_stopped(&self) -> StreamResult<()> {
        match self.state() {
            StreamState::Stopped => Err(StreamError::AlreadyStopped),
            _ => Ok(()),
        }
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::new(StreamConfig::default())
    }
}
