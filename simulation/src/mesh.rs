//! Generated network shapes
//!
//! [`MeshBuilder`] produces the usual test graphs (line, ring, star, full
//! mesh, random) over nodes `1..=n`; [`Mesh::to_topologies`] turns a graph
//! into one [`NodeTopology`] per node.

use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use meshwave_core::ConfigError;
use rand::Rng;

use crate::topology::{DEFAULT_PORT, NeighbourEntry, NodeTopology};

/// How generated nodes are given addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPlan {
    /// `127.0.1.<id>` on a shared port
    Loopback { port: u16 },
    /// One host, port `base_port + id`
    Ports { host: IpAddr, base_port: u16 },
}

impl Default for AddressPlan {
    fn default() -> Self {
        AddressPlan::Loopback { port: DEFAULT_PORT }
    }
}

impl AddressPlan {
    /// Every node on 127.0.0.1, ports counting up from `base_port`
    pub fn localhost(base_port: u16) -> Self {
        AddressPlan::Ports {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            base_port,
        }
    }

    /// Address of node `id`
    pub fn address(&self, id: u32) -> Result<SocketAddr, ConfigError> {
        match *self {
            AddressPlan::Loopback { port } => {
                let last = u8::try_from(id)
                    .ok()
                    .filter(|b| *b > 0 && *b < 255)
                    .ok_or_else(|| {
                        ConfigError::InvalidTopology(format!(
                            "node {} does not fit in 127.0.1.x",
                            id
                        ))
                    })?;
                Ok(SocketAddr::from(([127, 0, 1, last], port)))
            }
            AddressPlan::Ports { host, base_port } => u16::try_from(id)
                .ok()
                .and_then(|id| base_port.checked_add(id))
                .map(|port| SocketAddr::new(host, port))
                .ok_or_else(|| {
                    ConfigError::InvalidTopology(format!(
                        "node {} does not fit above port {}",
                        id, base_port
                    ))
                }),
        }
    }
}

/// An undirected graph over node ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mesh {
    adjacency: BTreeMap<u32, BTreeSet<u32>>,
}

impl Mesh {
    /// Create an empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with no edges
    pub fn add_node(&mut self, id: u32) {
        self.adjacency.entry(id).or_default();
    }

    /// Connect two nodes; self-loops are ignored
    pub fn connect(&mut self, a: u32, b: u32) {
        if a == b {
            return;
        }
        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
    }

    /// Neighbors of `id`
    pub fn neighbors(&self, id: u32) -> Option<&BTreeSet<u32>> {
        self.adjacency.get(&id)
    }

    /// Check if two nodes share an edge
    pub fn are_connected(&self, a: u32, b: u32) -> bool {
        self.adjacency
            .get(&a)
            .is_some_and(|neighbors| neighbors.contains(&b))
    }

    /// All node ids in order
    pub fn node_ids(&self) -> Vec<u32> {
        self.adjacency.keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    /// True if every node can reach every other
    pub fn is_connected(&self) -> bool {
        let Some(&start) = self.adjacency.keys().next() else {
            return true;
        };
        let mut seen = BTreeSet::from([start]);
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            for &next in &self.adjacency[&id] {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        seen.len() == self.adjacency.len()
    }

    /// One topology per node, addressed by `plan`
    pub fn to_topologies(&self, plan: AddressPlan) -> Result<Vec<NodeTopology>, ConfigError> {
        let addresses = self
            .adjacency
            .keys()
            .map(|&id| Ok((id, plan.address(id)?)))
            .collect::<Result<BTreeMap<_, _>, ConfigError>>()?;

        Ok(self
            .adjacency
            .iter()
            .map(|(&id, neighbors)| NodeTopology {
                id,
                address: addresses[&id].to_string(),
                neighbours: neighbors
                    .iter()
                    .map(|&n| NeighbourEntry {
                        id: n,
                        address: addresses[&n].to_string(),
                        edge_weight: 1,
                    })
                    .collect(),
            })
            .collect())
    }

    /// Rebuild a mesh from topology files
    pub fn from_topologies(topologies: &[NodeTopology]) -> Self {
        let mut mesh = Mesh::new();
        for topology in topologies {
            mesh.add_node(topology.id);
            for neighbour in &topology.neighbours {
                mesh.connect(topology.id, neighbour.id);
            }
        }
        mesh
    }

    /// Adjacency list as text
    pub fn visualize(&self) -> String {
        let mut output = String::new();
        output.push_str("Mesh Topology:\n");
        output.push_str(&format!("  Nodes: {}\n", self.node_count()));
        output.push_str(&format!("  Edges: {}\n\n", self.edge_count()));

        for (id, neighbors) in &self.adjacency {
            let neighbor_str: Vec<String> = neighbors.iter().map(|n| n.to_string()).collect();
            output.push_str(&format!("  {} -> [{}]\n", id, neighbor_str.join(", ")));
        }
        output
    }
}

/// Create a mesh from an edge list
pub fn from_edges(edges: &[(u32, u32)]) -> Mesh {
    let mut mesh = Mesh::new();
    for &(a, b) in edges {
        mesh.connect(a, b);
    }
    mesh
}

/// Shapes the builder knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Line,
    Ring,
    Star,
    Full,
    Random,
}

/// Builder for generated meshes over nodes `1..=n`
#[derive(Debug, Clone, Copy)]
pub struct MeshBuilder {
    node_count: u32,
}

impl MeshBuilder {
    pub fn new(node_count: u32) -> Self {
        Self { node_count }
    }

    fn nodes(&self) -> Mesh {
        let mut mesh = Mesh::new();
        for id in 1..=self.node_count {
            mesh.add_node(id);
        }
        mesh
    }

    /// Build `shape`; `probability` only matters for random meshes
    pub fn build(self, shape: Shape, probability: f64) -> Mesh {
        match shape {
            Shape::Line => self.line(),
            Shape::Ring => self.ring(),
            Shape::Star => self.star(),
            Shape::Full => self.full_mesh(),
            Shape::Random => self.random(probability),
        }
    }

    /// 1 - 2 - 3 - ... - n
    pub fn line(self) -> Mesh {
        let mut mesh = self.nodes();
        for id in 1..self.node_count {
            mesh.connect(id, id + 1);
        }
        mesh
    }

    /// 1 - 2 - ... - n - 1
    pub fn ring(self) -> Mesh {
        let mut mesh = self.line();
        if self.node_count > 2 {
            mesh.connect(self.node_count, 1);
        }
        mesh
    }

    /// Node 1 in the center
    pub fn star(self) -> Mesh {
        let mut mesh = self.nodes();
        for id in 2..=self.node_count {
            mesh.connect(1, id);
        }
        mesh
    }

    /// Every node connected to every other
    pub fn full_mesh(self) -> Mesh {
        let mut mesh = self.nodes();
        for a in 1..=self.node_count {
            for b in (a + 1)..=self.node_count {
                mesh.connect(a, b);
            }
        }
        mesh
    }

    /// Each edge present with `probability`, then patched until connected
    pub fn random(self, probability: f64) -> Mesh {
        let mut rng = rand::rng();
        let mut mesh = self.nodes();

        for a in 1..=self.node_count {
            for b in (a + 1)..=self.node_count {
                if rng.random::<f64>() < probability {
                    mesh.connect(a, b);
                }
            }
        }

        // Join every node unreachable from 1 to a random reachable one
        let mut reached = reachable_from(&mesh, 1);
        for id in 1..=self.node_count {
            if reached.contains(&id) {
                continue;
            }
            let anchors: Vec<u32> = reached.iter().copied().collect();
            let anchor = anchors[rng.random_range(0..anchors.len())];
            mesh.connect(id, anchor);
            reached.extend(reachable_from(&mesh, id));
        }

        mesh
    }
}

fn reachable_from(mesh: &Mesh, start: u32) -> BTreeSet<u32> {
    let mut seen = BTreeSet::new();
    if mesh.neighbors(start).is_none() {
        return seen;
    }
    seen.insert(start);
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        for &next in mesh.neighbors(id).into_iter().flatten() {
            if seen.insert(next) {
                stack.push(next);
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_topology() {
        let mesh = MeshBuilder::new(4).ring();
        assert_eq!(mesh.node_count(), 4);
        assert_eq!(mesh.edge_count(), 4);

        assert!(mesh.are_connected(1, 2));
        assert!(mesh.are_connected(4, 1)); // Wrap around
        assert!(!mesh.are_connected(1, 3));
    }

    #[test]
    fn test_small_shapes() {
        assert_eq!(MeshBuilder::new(2).ring().edge_count(), 1);
        assert_eq!(MeshBuilder::new(1).line().edge_count(), 0);
        assert_eq!(MeshBuilder::new(1).line().node_count(), 1);

        let star = MeshBuilder::new(5).star();
        assert_eq!(star.neighbors(1).unwrap().len(), 4);
        assert_eq!(star.neighbors(3).unwrap(), &BTreeSet::from([1]));
    }

    #[test]
    fn test_full_mesh() {
        let mesh = MeshBuilder::new(4).full_mesh();
        assert_eq!(mesh.edge_count(), 6);
        for a in 1..=4 {
            for b in 1..=4 {
                if a != b {
                    assert!(mesh.are_connected(a, b));
                }
            }
        }
    }

    #[test]
    fn test_random_is_connected() {
        for _ in 0..20 {
            let mesh = MeshBuilder::new(12).random(0.05);
            assert_eq!(mesh.node_count(), 12);
            assert!(mesh.is_connected());
        }
        assert!(MeshBuilder::new(8).random(1.0) == MeshBuilder::new(8).full_mesh());
    }

    #[test]
    fn test_address_plans() {
        let loopback = AddressPlan::default();
        assert_eq!(loopback.address(3).unwrap(), "127.0.1.3:30000".parse().unwrap());
        assert!(loopback.address(0).is_err());
        assert!(loopback.address(300).is_err());

        let ports = AddressPlan::localhost(40000);
        assert_eq!(ports.address(3).unwrap(), "127.0.0.1:40003".parse().unwrap());
        assert!(AddressPlan::localhost(65530).address(10).is_err());
    }

    #[test]
    fn test_topologies_round_trip_through_mesh() {
        let mesh = from_edges(&[(1, 2), (2, 3), (3, 1), (3, 4)]);
        let topologies = mesh.to_topologies(AddressPlan::default()).unwrap();

        assert_eq!(topologies.len(), 4);
        let three = &topologies[2];
        assert_eq!(three.id, 3);
        assert_eq!(three.address, "127.0.1.3:30000");
        assert_eq!(three.neighbours.len(), 3);

        assert_eq!(Mesh::from_topologies(&topologies), mesh);
    }

    #[test]
    fn test_visualize() {
        let text = from_edges(&[(1, 2)]).visualize();
        assert!(text.contains("Edges: 1"));
        assert!(text.contains("1 -> [2]"));
    }
}
