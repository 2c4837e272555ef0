//! Subscribe-side transports.
//!
//! The listener never creates sockets itself. The caller constructs a
//! [`Transport`] and injects it, which keeps socket lifetimes explicit and lets
//! tests substitute an in-process fake.
//!
//! Each trait is small and focused:
//! - [`Transport`] resolves an endpoint and subscribes to every message on it.
//! - [`Subscription`] yields raw message payloads until the subscription closes.
//!
//! Both are async (via `#[async_trait]`) and thread-safe, so an ingestion loop
//! can drive them from its own runtime.

pub mod channel;
pub mod zmq;

pub use channel::ChannelTransport;
pub use zmq::ZmqTransport;

use crate::error::AppResult;
use async_trait::async_trait;
use bytes::Bytes;

/// Factory for subscriptions on a publish/subscribe transport.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Connect to `address` and subscribe with an empty topic filter.
    ///
    /// Malformed or unreachable endpoints are reported here as
    /// [`StreamError::Connection`](crate::error::StreamError::Connection).
    async fn subscribe(&self, address: &str) -> AppResult<Box<dyn Subscription>>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// An established subscription.
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next message payload.
    ///
    /// Returns `Ok(None)` once the subscription is closed for good. Errors are
    /// transient and the caller may keep receiving.
    async fn recv(&mut self) -> AppResult<Option<Bytes>>;
}
