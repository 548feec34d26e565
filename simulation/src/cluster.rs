//! Multi-node launcher
//!
//! A [`Cluster`] runs every node of a topology inside one process. All
//! listeners are bound before any node starts serving, so a wave root can
//! start as soon as [`Cluster::launch`] returns without racing slow binds.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use meshwave_core::{EventSink, NodeId};
use meshwave_node::{NodeConfig, NodeHandle, NodeRuntime};
use meshwave_transport::TcpTransport;
use meshwave_tree::SpanningTree;
use tracing::{info, warn};

use crate::error::{SimulationError, SimulationResult};
use crate::inventory::DirectoryInventory;
use crate::topology::{NodeTopology, load_dir};

/// Connect timeout for node-to-node sends
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// What to launch
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Directory holding one topology file per node
    pub topology_dir: PathBuf,
    /// Directory holding one warehouse directory per node
    pub warehouse_dir: PathBuf,
    /// Settings shared by every node
    pub node: NodeConfig,
    /// Node that starts a spanning-tree run once everything listens
    pub wave_root: Option<u32>,
    pub connect_timeout: Duration,
}

impl ClusterConfig {
    pub fn new(topology_dir: impl Into<PathBuf>, warehouse_dir: impl Into<PathBuf>) -> Self {
        Self {
            topology_dir: topology_dir.into(),
            warehouse_dir: warehouse_dir.into(),
            node: NodeConfig::default(),
            wave_root: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_node_config(mut self, node: NodeConfig) -> Self {
        self.node = node;
        self
    }

    pub fn with_wave_root(mut self, root: u32) -> Self {
        self.wave_root = Some(root);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Every node of a topology running in this process
#[derive(Debug)]
pub struct Cluster {
    nodes: BTreeMap<NodeId, NodeHandle>,
}

impl Cluster {
    /// Load the topology directory and start every node
    pub async fn launch(config: ClusterConfig, sink: Arc<dyn EventSink>) -> SimulationResult<Self> {
        let topologies = load_dir(&config.topology_dir)?;
        Self::launch_topologies(&topologies, &config, sink).await
    }

    /// Start one node per topology
    pub async fn launch_topologies(
        topologies: &[NodeTopology],
        config: &ClusterConfig,
        sink: Arc<dyn EventSink>,
    ) -> SimulationResult<Self> {
        if let Some(root) = config.wave_root {
            if !topologies.iter().any(|t| t.id == root) {
                return Err(SimulationError::UnknownNode(root));
            }
        }

        let transport = Arc::new(TcpTransport::new().with_connect_timeout(config.connect_timeout));

        let mut bound = Vec::with_capacity(topologies.len());
        for topology in topologies {
            let table = topology.neighbor_table()?;
            let inventory = DirectoryInventory::load(&config.warehouse_dir, topology.id)?;
            let runtime = NodeRuntime::new(
                table,
                Arc::new(inventory),
                transport.clone(),
                Arc::clone(&sink),
                config.node.clone(),
            );
            let listener = runtime.bind().await?;
            bound.push((runtime, listener));
        }

        // Dropping a partial cluster cancels whatever already started
        let mut cluster = Self {
            nodes: BTreeMap::new(),
        };
        for (runtime, listener) in bound {
            let handle = runtime.spawn_on(listener)?;
            cluster.nodes.insert(runtime.local().id, handle);
        }
        info!(nodes = cluster.len(), "cluster listening");

        if let Some(root) = config.wave_root {
            cluster.start_wave(root)?;
        }
        Ok(cluster)
    }

    /// Start a spanning-tree run at `root`
    pub fn start_wave(&self, root: u32) -> SimulationResult<()> {
        let handle = self
            .nodes
            .get(&NodeId(root))
            .ok_or(SimulationError::UnknownNode(root))?;
        info!(root, "starting wave");
        handle.runtime().start_wave();
        Ok(())
    }

    /// Discard the current run on every node
    pub fn reset_tree(&self) {
        for handle in self.nodes.values() {
            handle.runtime().reset_tree();
        }
    }

    /// Wait for every node to finish the current run and assemble the tree
    pub async fn wait_for_tree(&self, timeout: Duration) -> SimulationResult<SpanningTree> {
        let mut snapshots = BTreeMap::new();
        let wait = async {
            for (&id, handle) in &self.nodes {
                snapshots.insert(id, handle.runtime().wait_for_tree().await?);
            }
            Ok::<_, SimulationError>(())
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| SimulationError::TreeTimeout)??;
        Ok(SpanningTree::from_snapshots(&snapshots)?)
    }

    /// A node's runtime
    pub fn node(&self, id: u32) -> Option<&Arc<NodeRuntime>> {
        self.nodes.get(&NodeId(id)).map(NodeHandle::runtime)
    }

    /// Address each node is serving on
    pub fn addresses(&self) -> BTreeMap<NodeId, SocketAddr> {
        self.nodes
            .iter()
            .map(|(&id, handle)| (id, handle.local_addr()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Stop every node and wait for in-flight sends
    pub async fn stop(mut self) {
        for (id, handle) in std::mem::take(&mut self.nodes) {
            handle.stop().await;
            info!(node = %id, "stopped");
        }
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        if self.nodes.is_empty() {
            return;
        }
        warn!(nodes = self.nodes.len(), "cluster dropped without stop, cancelling nodes");
        for handle in self.nodes.values() {
            handle.shutdown_token().cancel();
        }
    }
}
