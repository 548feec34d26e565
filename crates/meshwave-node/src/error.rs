//! Error types for the node runtime

use meshwave_core::{ConfigError, TransportError};
use thiserror::Error;

/// Errors that can occur in the node runtime
///
/// Per-message failures never surface here; they become events.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Startup configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A send the caller awaited directly failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel error (broadcast/watch)
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for node operations
pub type NodeResult<T> = Result<T, NodeError>;
