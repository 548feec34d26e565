//! Mock transport implementation for testing
//!
//! Provides an in-memory network so both protocols can be exercised end to
//! end without sockets. Every registered address gets an inbox channel;
//! sending to an address pushes the message into that inbox.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meshwave_core::{MockNetwork, Transport, WireMessage, NodeId};
//!
//! let network = MockNetwork::new();
//! let mut inbox = network.register(addr_b);
//!
//! network.send(addr_b, WireMessage::Wave { sender: NodeId(1) }).await?;
//! let message = inbox.recv().await.unwrap();
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::message::WireMessage;
use crate::transport::Transport;

/// Default inbox capacity per endpoint
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;

/// A shared in-memory network of endpoints
///
/// Cloning is cheap; clones see the same endpoints.
#[derive(Clone, Default)]
pub struct MockNetwork {
    inner: Arc<MockNetworkInner>,
}

#[derive(Default)]
struct MockNetworkInner {
    /// Inbox senders by listening address
    endpoints: DashMap<SocketAddr, mpsc::Sender<WireMessage>>,
    /// Messages successfully delivered into an inbox
    delivered: AtomicUsize,
}

impl MockNetwork {
    /// Create an empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint with the default inbox capacity
    pub fn register(&self, address: SocketAddr) -> mpsc::Receiver<WireMessage> {
        self.register_with_capacity(address, DEFAULT_INBOX_CAPACITY)
    }

    /// Register an endpoint, replacing any previous registration
    pub fn register_with_capacity(
        &self,
        address: SocketAddr,
        capacity: usize,
    ) -> mpsc::Receiver<WireMessage> {
        let (tx, rx) = mpsc::channel(capacity);
        self.inner.endpoints.insert(address, tx);
        rx
    }

    /// Remove an endpoint; later sends to it fail with `UnknownAddress`
    pub fn unregister(&self, address: &SocketAddr) {
        self.inner.endpoints.remove(address);
    }

    /// Check whether an endpoint is registered
    pub fn is_registered(&self, address: &SocketAddr) -> bool {
        self.inner.endpoints.contains_key(address)
    }

    /// Number of messages delivered so far
    pub fn delivered_count(&self) -> usize {
        self.inner.delivered.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for MockNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockNetwork")
            .field("endpoints", &self.inner.endpoints.len())
            .field("delivered", &self.delivered_count())
            .finish()
    }
}

#[async_trait]
impl Transport for MockNetwork {
    async fn send(&self, target: SocketAddr, message: WireMessage) -> Result<(), TransportError> {
        // Clone the sender out so the map shard is not held across the await
        let sender = self
            .inner
            .endpoints
            .get(&target)
            .map(|entry| entry.value().clone())
            .ok_or(TransportError::UnknownAddress(target))?;

        sender
            .send(message)
            .await
            .map_err(|_| TransportError::EndpointClosed(target))?;

        self.inner.delivered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::NodeId;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let network = MockNetwork::new();
        let mut inbox = network.register(addr(2));

        tokio_test::assert_ok!(
            network
                .send(addr(2), WireMessage::Wave { sender: NodeId(1) })
                .await
        );

        let message = inbox.recv().await.unwrap();
        assert_eq!(message, WireMessage::Wave { sender: NodeId(1) });
        assert_eq!(network.delivered_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_address() {
        let network = MockNetwork::new();
        let result = network
            .send(addr(9), WireMessage::Reject { sender: NodeId(1) })
            .await;
        assert!(matches!(result, Err(TransportError::UnknownAddress(a)) if a == addr(9)));
    }

    #[tokio::test]
    async fn test_closed_endpoint() {
        let network = MockNetwork::new();
        let inbox = network.register(addr(3));
        drop(inbox);

        let result = network
            .send(addr(3), WireMessage::ParentAck { sender: NodeId(1) })
            .await;
        assert!(matches!(result, Err(TransportError::EndpointClosed(_))));
        assert_eq!(network.delivered_count(), 0);
    }

    #[tokio::test]
    async fn test_unregister() {
        let network = MockNetwork::new();
        let _inbox = network.register(addr(4));
        assert!(network.is_registered(&addr(4)));

        network.unregister(&addr(4));
        assert!(!network.is_registered(&addr(4)));

        let clone = network.clone();
        tokio_test::assert_err!(
            clone
                .send(addr(4), WireMessage::Wave { sender: NodeId(1) })
                .await
        );
    }
}
