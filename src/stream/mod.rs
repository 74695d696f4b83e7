//! Event Stream Core
//!
//! Concurrent consumer registry and dispatch engine.
//!
//! ## Architecture
//!
//! - **Registry**: consumers and their topic interests behind one `RwLock`
//! - **Dispatcher**: single background task draining the intake queue
//! - **Stream**: caller-owned hub with an explicit lifecycle
//! - **Sink**: per-consumer delivery endpoint supplied by the transport
//!
//! ```text
//! producer → intake (bounded mpsc) → dispatcher → registry snapshot → Sink::deliver
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use eventsource::stream::{ChannelSink, Consumer, Event, Stream, StreamConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), eventsource::stream::StreamError> {
//! let stream = Stream::new(StreamConfig::default());
//! stream.start().await?;
//!
//! let (sink, mut rx) = ChannelSink::channel(64, Duration::from_secs(5));
//! let consumer = Consumer::new(Arc::new(sink));
//! stream.subscribe(&consumer, "news").await?;
//!
//! stream.publish("news", Event::new("hello")).await?;
//! stream.shutdown().await?;
//!
//! assert_eq!(rx.recv().await.unwrap().data, "hello");
//! # Ok(())
//! # }
//! ```

mod dispatcher;
mod error;
mod event;
mod hub;
mod registry;
mod sink;

pub use dispatcher::{DeliveryMode, Dispatch, DispatchStats, Dispatcher, StatsSnapshot};
pub use error::{StreamError, StreamResult};
pub use event::{Event, TOPIC_CLOSED_EVENT};
pub use hub::{Stream, StreamConfig, StreamState};
pub use registry::{ConsumerHandle, Registry};
pub use sink::{ChannelSink, Consumer, ConsumerId, DeliveryStatus, Sink};
