//! Static neighbor table
//!
//! The [`NeighborTable`] is the topology provider of a node: its own identity
//! plus an ordered list of direct neighbors. It is built once at startup and
//! never changes afterwards.

use std::collections::HashSet;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::identity::{LocalNode, NodeId};

/// A directly connected node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Neighbor {
    /// Neighbor's topology id
    pub id: NodeId,
    /// Neighbor's listening address
    pub address: SocketAddr,
    /// Edge weight (carried by the topology, unused by the protocols)
    pub weight: u32,
}

impl Neighbor {
    /// Create a neighbor entry
    pub fn new(id: impl Into<NodeId>, address: SocketAddr, weight: u32) -> Self {
        Self {
            id: id.into(),
            address,
            weight,
        }
    }
}

/// Read-only view of a node's position in the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborTable {
    local: LocalNode,
    neighbors: Vec<Neighbor>,
}

impl NeighborTable {
    /// Build a table, rejecting self-loops and duplicate neighbors
    pub fn new(local: LocalNode, neighbors: Vec<Neighbor>) -> Result<Self, ConfigError> {
        let mut ids = HashSet::with_capacity(neighbors.len());
        let mut addresses = HashSet::with_capacity(neighbors.len());

        for neighbor in &neighbors {
            if neighbor.id == local.id || neighbor.address == local.address {
                return Err(ConfigError::InvalidTopology(format!(
                    "{} lists itself as a neighbor",
                    local.id
                )));
            }
            if !ids.insert(neighbor.id) {
                return Err(ConfigError::InvalidTopology(format!(
                    "{} lists {} twice",
                    local.id, neighbor.id
                )));
            }
            if !addresses.insert(neighbor.address) {
                return Err(ConfigError::InvalidTopology(format!(
                    "{} lists address {} twice",
                    local.id, neighbor.address
                )));
            }
        }

        Ok(Self { local, neighbors })
    }

    /// This node's identity
    pub fn local(&self) -> LocalNode {
        self.local
    }

    /// This node's id
    pub fn local_id(&self) -> NodeId {
        self.local.id
    }

    /// This node's listening address
    pub fn local_address(&self) -> SocketAddr {
        self.local.address
    }

    /// All neighbors, in topology order
    pub fn neighbors(&self) -> &[Neighbor] {
        &self.neighbors
    }

    /// Number of neighbors
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// True if the node is isolated
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Look up a neighbor by id
    pub fn get(&self, id: NodeId) -> Option<&Neighbor> {
        self.neighbors.iter().find(|n| n.id == id)
    }

    /// Look up a neighbor by address
    pub fn by_address(&self, address: SocketAddr) -> Option<&Neighbor> {
        self.neighbors.iter().find(|n| n.address == address)
    }

    /// Check whether `id` is a direct neighbor
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Neighbors other than the one at `address`
    pub fn except_address(&self, address: SocketAddr) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.iter().filter(move |n| n.address != address)
    }

    /// Neighbors other than `id`
    pub fn except_id(&self, id: NodeId) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.iter().filter(move |n| n.id != id)
    }
}
