//! Wire message types
//!
//! Every message a node can receive is one variant of [`WireMessage`]. The
//! search messages carry addresses because responses travel back along the
//! reverse path; the wave messages only carry the sender's id, which the
//! receiver resolves through its neighbor table.

use std::fmt::Display;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::identity::{NodeId, RequestId};

/// A search request being flooded between nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Deduplication key of the search
    pub request_id: RequestId,
    /// Search term, matched as a case-insensitive substring
    pub term: String,
    /// Remaining hops
    pub ttl: u32,
    /// Node that forwarded this query, where responses must be sent
    pub return_address: SocketAddr,
}

/// A single search hit travelling back toward the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Search this hit belongs to
    pub request_id: RequestId,
    /// Matching item name
    pub item: String,
    /// Node that holds the item
    pub responder: SocketAddr,
}

/// A search submitted by a client to its access node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRequest {
    /// Deduplication key of the search
    pub request_id: RequestId,
    /// Search term
    pub term: String,
    /// Where the client collects responses
    pub client_address: SocketAddr,
}

/// Messages exchanged between nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireMessage {
    /// Flooded search request
    Query(QueryRequest),
    /// Search hit routed along the reverse path
    Response(QueryResponse),
    /// Search entry point from a client
    ClientRequest(ClientRequest),
    /// Spanning-tree wave propagation
    Wave { sender: NodeId },
    /// Sender accepts the receiver as its parent
    ParentAck { sender: NodeId },
    /// Sender already has a parent; the receiver is not it
    Reject { sender: NodeId },
}

impl WireMessage {
    /// The message kind (for dispatch and logging)
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Query(_) => MessageKind::Query,
            Self::Response(_) => MessageKind::Response,
            Self::ClientRequest(_) => MessageKind::ClientRequest,
            Self::Wave { .. } => MessageKind::Wave,
            Self::ParentAck { .. } => MessageKind::ParentAck,
            Self::Reject { .. } => MessageKind::Reject,
        }
    }

    /// The search this message belongs to, for search messages
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::Query(q) => Some(q.request_id),
            Self::Response(r) => Some(r.request_id),
            Self::ClientRequest(c) => Some(c.request_id),
            Self::Wave { .. } | Self::ParentAck { .. } | Self::Reject { .. } => None,
        }
    }

    /// The sending node, for wave messages
    pub fn wave_sender(&self) -> Option<NodeId> {
        match self {
            Self::Wave { sender } | Self::ParentAck { sender } | Self::Reject { sender } => {
                Some(*sender)
            }
            _ => None,
        }
    }
}

/// Discriminant of a [`WireMessage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Query,
    Response,
    ClientRequest,
    Wave,
    ParentAck,
    Reject,
}

impl MessageKind {
    /// True for the kinds handled by the search protocol
    pub fn is_search(&self) -> bool {
        matches!(self, Self::Query | Self::Response | Self::ClientRequest)
    }

    /// True for the kinds handled by the spanning-tree protocol
    pub fn is_wave(&self) -> bool {
        !self.is_search()
    }
}

impl Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Query => "Query",
            Self::Response => "Response",
            Self::ClientRequest => "ClientRequest",
            Self::Wave => "Wave",
            Self::ParentAck => "ParentAck",
            Self::Reject => "Reject",
        };
        f.write_str(name)
    }
}

/// A send decided by one of the protocols
///
/// The protocols never touch the network themselves: they return the sends
/// they want and the runtime hands them to the dispatcher once the node's
/// state lock is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Destination address
    pub target: SocketAddr,
    /// Message to deliver
    pub message: WireMessage,
}

impl Outbound {
    /// Create an outbound send
    pub fn new(target: SocketAddr, message: WireMessage) -> Self {
        Self { target, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_kind_and_accessors() {
        let id = RequestId::generate();
        let query = WireMessage::Query(QueryRequest {
            request_id: id,
            term: "ubuntu".into(),
            ttl: 5,
            return_address: addr(1),
        });
        assert_eq!(query.kind(), MessageKind::Query);
        assert_eq!(query.request_id(), Some(id));
        assert_eq!(query.wave_sender(), None);

        let wave = WireMessage::Reject { sender: NodeId(4) };
        assert_eq!(wave.kind(), MessageKind::Reject);
        assert_eq!(wave.request_id(), None);
        assert_eq!(wave.wave_sender(), Some(NodeId(4)));
    }

    #[test]
    fn test_kind_families() {
        assert!(MessageKind::ClientRequest.is_search());
        assert!(MessageKind::ParentAck.is_wave());
        assert!(!MessageKind::Wave.is_search());
        assert_eq!(MessageKind::ParentAck.to_string(), "ParentAck");
    }
}
