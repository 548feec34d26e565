//! Launching clusters from topology directories

use std::collections::BTreeMap;
use std::fs;
use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use meshwave_core::{MemoryEventSink, NodeId};
use meshwave_node::run_query;
use meshwave_simulation::{
    AddressPlan, Cluster, ClusterConfig, Mesh, MeshBuilder, NodeTopology, SimulationError,
    from_edges, save_dir,
};
use tempfile::TempDir;

/// Topologies for `mesh` on free loopback ports
fn on_free_ports(mesh: &Mesh) -> Vec<NodeTopology> {
    // Hold every probe listener until all ports are picked
    let probes: Vec<(String, TcpListener)> = mesh
        .to_topologies(AddressPlan::default())
        .unwrap()
        .into_iter()
        .map(|t| (t.address, TcpListener::bind("127.0.0.1:0").unwrap()))
        .collect();
    let ports: BTreeMap<String, SocketAddr> = probes
        .iter()
        .map(|(address, listener)| (address.clone(), listener.local_addr().unwrap()))
        .collect();
    drop(probes);

    let mut topologies = mesh.to_topologies(AddressPlan::default()).unwrap();
    for topology in &mut topologies {
        topology.address = ports[&topology.address].to_string();
        for neighbour in &mut topology.neighbours {
            neighbour.address = ports[&neighbour.address].to_string();
        }
    }
    topologies
}

fn stock(warehouses: &Path, node: u32, items: &[&str]) {
    let dir = warehouses.join(node.to_string());
    fs::create_dir_all(&dir).unwrap();
    for item in items {
        fs::write(dir.join(item), b"").unwrap();
    }
}

struct Fixture {
    _dir: TempDir,
    config: ClusterConfig,
    topologies: Vec<NodeTopology>,
}

fn fixture(mesh: &Mesh) -> Fixture {
    let dir = TempDir::new().unwrap();
    let topology_dir = dir.path().join("topology");
    let warehouses = dir.path().join("warehouses");

    let topologies = on_free_ports(mesh);
    save_dir(&topology_dir, &topologies).unwrap();

    Fixture {
        config: ClusterConfig::new(topology_dir, warehouses),
        topologies,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_ring_cluster_builds_tree() {
    let fixture = fixture(&MeshBuilder::new(6).ring());
    let config = fixture.config.clone().with_wave_root(1);

    let cluster = Cluster::launch(config, Arc::new(MemoryEventSink::new()))
        .await
        .unwrap();
    assert_eq!(cluster.len(), 6);

    let tree = cluster.wait_for_tree(Duration::from_secs(10)).await.unwrap();
    assert_eq!(tree.root(), NodeId(1));
    assert_eq!(tree.len(), 6);
    assert_eq!(tree.parent(NodeId(2)), Some(NodeId(1)));
    assert_eq!(tree.parent(NodeId(6)), Some(NodeId(1)));

    cluster.stop().await;
}

#[tokio::test]
async fn test_cluster_answers_searches_from_warehouses() {
    let fixture = fixture(&from_edges(&[(1, 2), (2, 3), (3, 4), (2, 4)]));
    let warehouses = &fixture.config.warehouse_dir;
    stock(warehouses, 3, &["ubuntu-22.iso", "readme.txt"]);
    stock(warehouses, 4, &["Ubuntu-24.iso"]);

    let sink = Arc::new(MemoryEventSink::new());
    let cluster = Cluster::launch(fixture.config.clone(), sink.clone())
        .await
        .unwrap();
    let access = cluster.addresses()[&NodeId(1)];

    let results = run_query(
        "127.0.0.1:0".parse().unwrap(),
        access,
        "ubuntu",
        Duration::from_millis(800),
    )
    .await
    .unwrap();

    let rendered = results.render();
    assert_eq!(rendered.len(), 2);
    assert!(rendered[0].starts_with("Ubuntu-24.iso is available on: "));
    assert!(rendered[1].starts_with("ubuntu-22.iso is available on: "));
    assert!(rendered[1].ends_with(&fixture.topologies[2].address));

    cluster.stop().await;
}

#[tokio::test]
async fn test_unknown_wave_root() {
    let fixture = fixture(&MeshBuilder::new(3).line());
    let config = fixture.config.clone().with_wave_root(9);

    let result = Cluster::launch(config, Arc::new(MemoryEventSink::new())).await;
    assert!(matches!(result, Err(SimulationError::UnknownNode(9))));
}

#[tokio::test]
async fn test_missing_topology_dir() {
    let dir = TempDir::new().unwrap();
    let config = ClusterConfig::new(dir.path().join("nope"), dir.path());

    let result = Cluster::launch(config, Arc::new(MemoryEventSink::new())).await;
    assert!(matches!(result, Err(SimulationError::Config(_))));
}

#[tokio::test]
async fn test_wave_can_be_rerun_from_another_root() {
    let fixture = fixture(&MeshBuilder::new(4).star());
    let cluster = Cluster::launch(fixture.config.clone(), Arc::new(MemoryEventSink::new()))
        .await
        .unwrap();

    cluster.start_wave(1).unwrap();
    let tree = cluster.wait_for_tree(Duration::from_secs(10)).await.unwrap();
    assert_eq!(tree.root(), NodeId(1));

    tokio::time::sleep(Duration::from_millis(100)).await;
    cluster.reset_tree();
    cluster.start_wave(3).unwrap();
    let tree = cluster.wait_for_tree(Duration::from_secs(10)).await.unwrap();
    assert_eq!(tree.root(), NodeId(3));
    assert_eq!(tree.parent(NodeId(1)), Some(NodeId(3)));
    assert_eq!(tree.parent(NodeId(2)), Some(NodeId(1)));
    assert_eq!(tree.depth(NodeId(4)), 2);

    assert!(matches!(
        cluster.start_wave(42),
        Err(SimulationError::UnknownNode(42))
    ));
    cluster.stop().await;
}
