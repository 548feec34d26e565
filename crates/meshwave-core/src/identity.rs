//! Node and request identities
//!
//! - [`NodeId`]: the integer id a node carries in its topology file
//! - [`LocalNode`]: a node's own id and listening address
//! - [`RequestId`]: the globally unique token of one search

use std::fmt::Display;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Integer identity of a node in the static topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a node id
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the underlying integer
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// A node's own identity, immutable for the process lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalNode {
    /// Topology id
    pub id: NodeId,
    /// Address the node listens on
    pub address: SocketAddr,
}

impl LocalNode {
    /// Create a local node identity
    pub fn new(id: impl Into<NodeId>, address: SocketAddr) -> Self {
        Self {
            id: id.into(),
            address,
        }
    }
}

impl Display for LocalNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}

/// Unique token of one search, used as the deduplication key
///
/// Generated once by whoever originates the search (normally the client).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Generate a fresh random request id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short display form (for logging)
    pub fn short_id(&self) -> String {
        let s = self.0.simple().to_string();
        s[..8].to_string()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId::new(4).to_string(), "node-4");
        assert_eq!(NodeId::from(12).as_u32(), 12);
    }

    #[test]
    fn test_local_node_display() {
        let node = LocalNode::new(2, "127.0.1.2:30000".parse().unwrap());
        assert_eq!(node.to_string(), "node-2@127.0.1.2:30000");
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
        assert_eq!(a.short_id().len(), 8);
        assert!(a.to_string().starts_with(&a.short_id()));
    }
}
