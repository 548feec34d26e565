//! Error types for the simulation

use meshwave_core::ConfigError;
use meshwave_node::NodeError;
use meshwave_tree::TreeError;
use thiserror::Error;

/// Errors raised while launching or inspecting simulated nodes
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Spanning tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Node {0} is not part of this cluster")]
    UnknownNode(u32),

    #[error("Timed out waiting for the spanning tree")]
    TreeTimeout,
}

/// Result type alias for simulation operations
pub type SimulationResult<T> = Result<T, SimulationError>;
