//! Configuration for the node runtime

use std::net::SocketAddr;

use meshwave_search::DEFAULT_INITIAL_TTL;
use meshwave_transport::SendPolicy;
use serde::{Deserialize, Serialize};

/// Configuration for a [`NodeRuntime`](crate::NodeRuntime)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address to bind instead of the topology address
    ///
    /// The topology address is still what the node advertises as
    /// `return_address` and `responder`.
    pub listen_addr: Option<SocketAddr>,
    /// TTL of queries this node originates for clients
    pub initial_ttl: u32,
    /// How outbound sends are executed
    pub send_policy: SendPolicy,
    /// Event broadcast channel capacity
    pub event_channel_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_addr: None,
            initial_ttl: DEFAULT_INITIAL_TTL,
            send_policy: SendPolicy::default(),
            event_channel_capacity: 1024,
        }
    }
}

impl NodeConfig {
    /// Bind `addr` instead of the topology address
    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = Some(addr);
        self
    }

    /// Set the initial TTL
    pub fn with_initial_ttl(mut self, ttl: u32) -> Self {
        self.initial_ttl = ttl;
        self
    }

    /// Set the send policy
    pub fn with_send_policy(mut self, policy: SendPolicy) -> Self {
        self.send_policy = policy;
        self
    }

    /// Set the event channel capacity
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }
}
