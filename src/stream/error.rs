//! Stream error types
//!
//! Only intake-level and lifecycle conditions surface to callers. A sink
//! that reports closed is handled inside the dispatcher by unregistering the
//! consumer; it never reaches the producer.

use thiserror::Error;

use super::sink::ConsumerId;

/// Errors returned by [`Stream`](super::Stream) operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The stream has completed shutdown
    #[error("Stream closed: already stopped")]
    AlreadyStopped,

    /// Shutdown has begun; the intake queue accepts no more events
    #[error("Event intake closed")]
    IntakeClosed,

    /// Shutdown has begun; new registrations are rejected
    #[error("Stream is shutting down")]
    ShuttingDown,

    /// Targeted send to a consumer that is not registered
    #[error("Unknown consumer: {0}")]
    UnknownConsumer(ConsumerId),
}

/// Result type alias for stream operations
pub type StreamResult<T> = Result<T, StreamError>;
