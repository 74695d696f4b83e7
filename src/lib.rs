//! # Eventsource
//!
//! Server-push event hub. Producers hand events to a [`Stream`]; the stream
//! fans them out to every connected consumer (broadcast) or to the consumers
//! subscribed to a topic (publish/subscribe).
//!
//! ## Features
//!
//! - **Non-blocking producers**: events go through a bounded intake queue
//! - **Snapshot delivery**: slow consumers never hold the registry lock
//! - **Dispatch-time topic filtering**: subscriptions are resolved when an
//!   event is delivered
//! - **Graceful shutdown**: queued events drain before the stream stops
//! - **Server-Sent Events**: Axum transport with a pluggable connection hook
//!
//! ## Modules
//!
//! - [`stream`]: Registry, dispatcher and lifecycle
//! - [`api`]: SSE and producer endpoints with Axum
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eventsource::stream::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stream = Stream::new(StreamConfig::default());
//!     stream.start().await?;
//!
//!     let (sink, mut rx) = ChannelSink::channel(64, Duration::from_secs(5));
//!     let consumer = Consumer::new(Arc::new(sink));
//!     stream.register(&consumer).await?;
//!
//!     stream.broadcast(Event::new("hello").with_type("greeting")).await?;
//!
//!     // Graceful shutdown
//!     stream.shutdown().await?;
//!
//!     println!("Received {:?}", rx.recv().await);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod stream;

// Re-export top-level types for convenience
pub use stream::{
    ChannelSink, Consumer, ConsumerHandle, ConsumerId, DeliveryMode, DeliveryStatus, Event,
    Registry, Sink, Stream, StreamConfig, StreamError, StreamResult, StreamState,
};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState, ConnectHook, HeaderIdHook};

pub use config::{generate_default_config, Config, ConfigError, LogFormat, LoggingConfig};
