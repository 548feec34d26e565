//! Transport abstraction for message passing
//!
//! The [`Transport`] trait delivers one message to one address. Delivery is
//! best effort: there is no acknowledgment, no retry and no ordering between
//! two sends, even to the same target.
//!
//! ## Implementations
//!
//! - [`MockNetwork`](crate::MockNetwork): In-memory transport for testing
//! - `TcpTransport`: One short-lived TCP connection per message (in
//!   meshwave-transport)

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::message::WireMessage;

/// Transport trait for message passing between nodes
///
/// # Example
///
/// ```rust,ignore
/// use meshwave_core::{Transport, WireMessage, NodeId};
///
/// async fn announce<T: Transport>(transport: &T, target: SocketAddr) {
///     let wave = WireMessage::Wave { sender: NodeId(1) };
///     if let Err(e) = transport.send(target, wave).await {
///         tracing::warn!(error = %e, "wave not delivered");
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `message` to the node listening at `target`
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be reached or the write fails.
    /// The caller decides whether the failure is observable; it is never
    /// retried here.
    async fn send(&self, target: SocketAddr, message: WireMessage) -> Result<(), TransportError>;
}
