//! Per-node span context
//!
//! Several nodes share one process in the simulator, so every task a node
//! spawns runs inside that node's span and its log lines carry the node id.

use meshwave_core::LocalNode;
use tracing::Span;

/// Span that tags everything a node logs
pub fn node_span(local: &LocalNode) -> Span {
    tracing::info_span!("node", id = local.id.as_u32(), addr = %local.address)
}

/// Span for the client role
pub fn client_span(local: std::net::SocketAddr) -> Span {
    tracing::info_span!("client", addr = %local)
}
