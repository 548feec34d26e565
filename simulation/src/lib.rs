//! # Meshwave Simulation
//!
//! Runs Meshwave nodes from topology files on one machine.
//!
//! ## Overview
//!
//! Each node is described by a TOML file naming its id, its address and its
//! neighbours. Its searchable items are the files in its warehouse directory.
//! A whole directory of topology files can be launched in one process as a
//! [`Cluster`], or a single node can be run on its own.
//!
//! - **Topology** (`topology.rs`): Topology file format and loading
//! - **Inventory** (`inventory.rs`): Warehouse directories as [`Inventory`](meshwave_core::Inventory)
//! - **Mesh** (`mesh.rs`): Generated line, ring, star, full and random graphs
//! - **Cluster** (`cluster.rs`): Launch every node of a topology directory
//!
//! ## Example
//!
//! ```rust,ignore
//! use meshwave_simulation::*;
//!
//! // Eight nodes in a ring on 127.0.1.1 - 127.0.1.8
//! let mesh = MeshBuilder::new(8).ring();
//! save_dir("topology", &mesh.to_topologies(AddressPlan::default())?)?;
//!
//! let config = ClusterConfig::new("topology", "warehouses").with_wave_root(1);
//! let cluster = Cluster::launch(config, Arc::new(TracingEventSink::new())).await?;
//! println!("{}", cluster.wait_for_tree(Duration::from_secs(10)).await?);
//! cluster.stop().await;
//! ```

pub mod cluster;
pub mod error;
pub mod inventory;
pub mod mesh;
pub mod topology;

// Re-export main types
pub use cluster::{Cluster, ClusterConfig, DEFAULT_CONNECT_TIMEOUT};
pub use error::{SimulationError, SimulationResult};
pub use inventory::DirectoryInventory;
pub use mesh::{AddressPlan, Mesh, MeshBuilder, Shape, from_edges};
pub use topology::{DEFAULT_PORT, NeighbourEntry, NodeTopology, load_dir, parse_address, save_dir};
