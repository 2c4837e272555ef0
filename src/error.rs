//! Custom error types for the listener.
//!
//! This module defines `StreamError`, the single error type used across the crate.
//! Using the `thiserror` crate, it separates the failures that are fatal to a
//! listener (connection, configuration, spawning the ingestion thread) from the
//! per-message failures that the ingestion loop handles locally.
//!
//! ## Error Hierarchy
//!
//! - **`Connection`**: The endpoint could not be resolved or connected. Returned from
//!   `DataListener::start` and never deferred into the background loop.
//! - **`InvalidData`** / **`InvalidWidth`**: A received message could not be turned
//!   into a record. These are recoverable: the message is dropped, a diagnostic is
//!   emitted and ingestion continues.
//! - **`Configuration`** / **`Config`**: Semantic validation failures and figment
//!   loading failures respectively.
//! - **`ListenerStopped`**: `start` was called on a listener that has already been
//!   stopped. A listener runs at most one ingestion loop in its lifetime.
//! - **`Spawn`**: The ingestion thread or its runtime could not be created.
//! - **`Receive`**: A transient transport error while waiting for a message.
//! - **`Lagged`**: The subscription fell behind and the transport discarded
//!   messages. Ingestion continues with the next retained message.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, StreamError>;

#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum StreamError {
    #[error("Failed to connect to '{address}': {message}")]
    Connection { address: String, message: String },

    #[error("Invalid data '{raw}': {reason}")]
    InvalidData { raw: String, reason: String },

    #[error("Invalid record width: expected {expected}, got {actual}")]
    InvalidWidth { expected: usize, actual: usize },

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Listener has been stopped and cannot be restarted")]
    ListenerStopped,

    #[error("Failed to spawn ingestion thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Receive error: {0}")]
    Receive(String),

    #[error("Subscriber lagged, {skipped} messages dropped")]
    Lagged { skipped: u64 },
}

impl From<figment::Error> for StreamError {
    fn from(value: figment::Error) -> Self {
        StreamError::Config(Box::new(value))
    }
}

impl StreamError {
    /// Returns true for errors the ingestion loop recovers from by dropping a
    /// single message or retrying a receive.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StreamError::InvalidData { .. }
                | StreamError::InvalidWidth { .. }
                | StreamError::Receive(_)
                | StreamError::Lagged { .. }
        )
    }

    /// Returns true when the next receive should wait for [`RECV_BACKOFF`].
    ///
    /// A lagging subscriber already has messages queued, so it retries at once.
    ///
    /// [`RECV_BACKOFF`]: crate::ingest::RECV_BACKOFF
    pub fn needs_backoff(&self) -> bool {
        matches!(self, StreamError::Receive(_))
    }
}
