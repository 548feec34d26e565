//! Topology files
//!
//! One TOML file per node:
//!
//! ```toml
//! id = 1
//! address = "127.0.1.1"
//!
//! [[neighbours]]
//! id = 2
//! address = "127.0.1.2"
//! edge_weight = 1
//! ```
//!
//! An address without a port listens on [`DEFAULT_PORT`].

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use meshwave_core::{ConfigError, LocalNode, Neighbor, NeighborTable};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Port used when a topology address names only a host
pub const DEFAULT_PORT: u16 = 30000;

/// One neighbor entry of a topology file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighbourEntry {
    pub id: u32,
    pub address: String,
    #[serde(default = "default_weight")]
    pub edge_weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Contents of one topology file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTopology {
    pub id: u32,
    pub address: String,
    #[serde(default)]
    pub neighbours: Vec<NeighbourEntry>,
}

/// Parse `host` or `host:port`
pub fn parse_address(address: &str) -> Result<SocketAddr, ConfigError> {
    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }
    address
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DEFAULT_PORT))
        .map_err(|_| ConfigError::InvalidTopology(format!("bad address {:?}", address)))
}

impl NodeTopology {
    /// Parse a topology from TOML text
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::InvalidTopology(e.to_string()))
    }

    /// Read a topology file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            ConfigError::MissingTopology(format!("{}: {}", path.display(), e))
        })?;
        let topology = Self::parse(&text).map_err(|e| match e {
            ConfigError::InvalidTopology(reason) => {
                ConfigError::InvalidTopology(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })?;
        debug!(path = %path.display(), id = topology.id, "loaded topology");
        Ok(topology)
    }

    /// Serialize to TOML text
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidTopology(e.to_string()))
    }

    /// Write this topology to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// File name this topology is stored under
    pub fn file_name(&self) -> String {
        format!("node-{}.toml", self.id)
    }

    /// Resolved listen address
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_address(&self.address)
    }

    /// Build the runtime's view of this node's neighbors
    pub fn neighbor_table(&self) -> Result<NeighborTable, ConfigError> {
        let local = LocalNode::new(self.id, self.socket_addr()?);
        let neighbors = self
            .neighbours
            .iter()
            .map(|n| Ok(Neighbor::new(n.id, parse_address(&n.address)?, n.edge_weight)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        NeighborTable::new(local, neighbors)
    }
}

/// Every `*.toml` file in `dir`, sorted by node id
pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<NodeTopology>, ConfigError> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir)
        .map_err(|e| ConfigError::MissingTopology(format!("{}: {}", dir.display(), e)))?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "toml") {
            paths.push(path);
        }
    }

    let mut topologies = paths
        .iter()
        .map(NodeTopology::load)
        .collect::<Result<Vec<_>, _>>()?;
    if topologies.is_empty() {
        return Err(ConfigError::MissingTopology(format!(
            "no topology files in {}",
            dir.display()
        )));
    }

    topologies.sort_by_key(|t| t.id);
    if let Some(pair) = topologies.windows(2).find(|w| w[0].id == w[1].id) {
        return Err(ConfigError::InvalidTopology(format!(
            "node {} is described twice",
            pair[0].id
        )));
    }
    Ok(topologies)
}

/// Write every topology into `dir` as `node-<id>.toml`
pub fn save_dir(dir: impl AsRef<Path>, topologies: &[NodeTopology]) -> Result<Vec<PathBuf>, ConfigError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    topologies
        .iter()
        .map(|topology| {
            let path = dir.join(topology.file_name());
            topology.save(&path)?;
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshwave_core::NodeId;
    use tempfile::TempDir;

    const NODE_ONE: &str = r#"
id = 1
address = "127.0.1.1"

[[neighbours]]
id = 2
address = "127.0.1.2"
edge_weight = 3

[[neighbours]]
id = 3
address = "127.0.1.3:31000"
"#;

    #[test]
    fn test_parse() {
        let topology = NodeTopology::parse(NODE_ONE).unwrap();
        assert_eq!(topology.id, 1);
        assert_eq!(topology.neighbours.len(), 2);
        assert_eq!(topology.neighbours[1].edge_weight, 1);

        let table = topology.neighbor_table().unwrap();
        assert_eq!(table.local_address(), "127.0.1.1:30000".parse().unwrap());
        let three = table.get(NodeId(3)).unwrap();
        assert_eq!(three.address, "127.0.1.3:31000".parse().unwrap());
        assert_eq!(table.get(NodeId(2)).unwrap().weight, 3);
    }

    #[test]
    fn test_isolated_node() {
        let topology = NodeTopology::parse("id = 9\naddress = \"127.0.1.9\"\n").unwrap();
        assert!(topology.neighbours.is_empty());
        assert!(topology.neighbor_table().unwrap().is_empty());
    }

    #[test]
    fn test_invalid() {
        assert!(matches!(
            NodeTopology::parse("id = \"one\""),
            Err(ConfigError::InvalidTopology(_))
        ));

        let topology = NodeTopology::parse("id = 1\naddress = \"nowhere\"\n").unwrap();
        assert!(matches!(
            topology.neighbor_table(),
            Err(ConfigError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = NodeTopology::load(dir.path().join("node-1.toml"));
        assert!(matches!(result, Err(ConfigError::MissingTopology(_))));
        assert!(matches!(load_dir(dir.path()), Err(ConfigError::MissingTopology(_))));
    }

    #[test]
    fn test_dir_round_trip() {
        let dir = TempDir::new().unwrap();
        let one = NodeTopology::parse(NODE_ONE).unwrap();
        let two = NodeTopology {
            id: 2,
            address: "127.0.1.2".into(),
            neighbours: vec![NeighbourEntry {
                id: 1,
                address: "127.0.1.1".into(),
                edge_weight: 3,
            }],
        };

        let paths = save_dir(dir.path(), &[two.clone(), one.clone()]).unwrap();
        assert!(paths[0].ends_with("node-2.toml"));
        fs::write(dir.path().join("README"), "not a topology").unwrap();

        let loaded = load_dir(dir.path()).unwrap();
        assert_eq!(loaded, vec![one, two]);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.toml"), NODE_ONE).unwrap();
        fs::write(dir.path().join("b.toml"), NODE_ONE).unwrap();
        assert!(matches!(
            load_dir(dir.path()),
            Err(ConfigError::InvalidTopology(_))
        ));
    }
}
