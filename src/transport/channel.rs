//! In-process publish/subscribe transport.
//!
//! Every `inproc://<name>` address owns a `tokio::sync::broadcast` channel. The
//! process that holds the [`ChannelTransport`] publishes with
//! [`ChannelTransport::publish`] and every live subscription receives a copy.
//! Like a real pub/sub socket, messages published before anyone subscribes are
//! dropped, and a subscriber that falls more than `capacity` messages behind
//! loses the oldest ones.

use crate::error::{AppResult, StreamError};
use crate::transport::{Subscription, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Address scheme accepted by [`ChannelTransport`].
pub const INPROC_SCHEME: &str = "inproc://";

/// Default per-address queue depth.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Cloneable handle to a set of in-process topics.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    capacity: usize,
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<Bytes>>>>,
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelTransport {
    /// Create a transport with [`DEFAULT_CHANNEL_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a transport whose per-address queues hold `capacity` messages.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Publish `payload` to every current subscriber of `address`.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, address: &str, payload: impl Into<Bytes>) -> usize {
        let topics = self.topics.lock();
        match topics.get(address) {
            Some(sender) => sender.send(payload.into()).unwrap_or(0),
            None => {
                trace!(address, "Publish with no subscribers");
                0
            }
        }
    }

    /// Number of live subscriptions on `address`.
    pub fn subscriber_count(&self, address: &str) -> usize {
        self.topics
            .lock()
            .get(address)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Close `address`. Subscribers drain what is queued, then see the
    /// subscription end.
    pub fn close(&self, address: &str) -> bool {
        let removed = self.topics.lock().remove(address).is_some();
        if removed {
            debug!(address, "Closed in-process topic");
        }
        removed
    }

    fn validate(address: &str) -> AppResult<()> {
        match address.strip_prefix(INPROC_SCHEME) {
            Some(name) if !name.is_empty() => Ok(()),
            _ => Err(StreamError::Connection {
                address: address.to_string(),
                message: format!("expected an address of the form {INPROC_SCHEME}<name>"),
            }),
        }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn subscribe(&self, address: &str) -> AppResult<Box<dyn Subscription>> {
        Self::validate(address)?;

        let receiver = self
            .topics
            .lock()
            .entry(address.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        debug!(address, "Subscribed to in-process topic");
        Ok(Box::new(ChannelSubscription { receiver }))
    }

    fn name(&self) -> &'static str {
        "inproc"
    }
}

struct ChannelSubscription {
    receiver: broadcast::Receiver<Bytes>,
}

#[async_trait]
impl Subscription for ChannelSubscription {
    async fn recv(&mut self) -> AppResult<Option<Bytes>> {
        match self.receiver.recv().await {
            Ok(payload) => Ok(Some(payload)),
            Err(broadcast::error::RecvError::Closed) => Ok(None),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                Err(StreamError::Lagged { skipped })
            }
        }
    }
}
