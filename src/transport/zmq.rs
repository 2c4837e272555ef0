//! ZeroMQ SUB socket transport.
//!
//! Uses the pure-Rust `zeromq` crate on the tokio backend, so no system libzmq is
//! needed. Endpoints follow ZeroMQ syntax (`tcp://host:port`, `ipc:///path`) and
//! interoperate with libzmq/pyzmq publishers.
//!
//! `connect` keeps retrying a refused endpoint; callers bound it with a timeout
//! (see [`ListenerConfig::connect_timeout`](crate::config::ListenerConfig::connect_timeout)).

use crate::error::{AppResult, StreamError};
use crate::transport::{Subscription, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};
use zeromq::{Socket, SocketRecv, SubSocket};

/// Transport creating one ZeroMQ SUB socket per subscription.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZmqTransport;

impl ZmqTransport {
    /// Create a new transport handle.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for ZmqTransport {
    async fn subscribe(&self, address: &str) -> AppResult<Box<dyn Subscription>> {
        let connection_error = |e: zeromq::ZmqError| StreamError::Connection {
            address: address.to_string(),
            message: e.to_string(),
        };

        let mut socket = SubSocket::new();
        socket.connect(address).await.map_err(connection_error)?;
        socket.subscribe("").await.map_err(connection_error)?;

        info!(address, "Subscribed to ZeroMQ publisher");
        Ok(Box::new(ZmqSubscription { socket }))
    }

    fn name(&self) -> &'static str {
        "zmq"
    }
}

struct ZmqSubscription {
    socket: SubSocket,
}

#[async_trait]
impl Subscription for ZmqSubscription {
    async fn recv(&mut self) -> AppResult<Option<Bytes>> {
        let message = self
            .socket
            .recv()
            .await
            .map_err(|e| StreamError::Receive(e.to_string()))?;

        let mut frames = message.into_vec();
        if frames.len() > 1 {
            // Topic envelopes precede the payload.
            debug!(frames = frames.len(), "Multi-frame message, using final frame");
        }
        Ok(Some(frames.pop().unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_endpoint_fails_to_subscribe() {
        let transport = ZmqTransport::new();
        match transport.subscribe("not-an-endpoint").await {
            Err(StreamError::Connection { address, .. }) => {
                assert_eq!(address, "not-an-endpoint");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("subscribing to a malformed endpoint succeeded"),
        }
    }
}
