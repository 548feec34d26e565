//! # Meshwave Node
//!
//! Runtime for a single Meshwave node plus the client role.
//!
//! A node listens on one address. Every inbound connection carries exactly
//! one framed message; the runtime decodes it, routes it to the search
//! router or the spanning-tree builder by kind, and dispatches whatever
//! those decide to send.
//!
//! ## Example
//!
//! ```rust,ignore
//! use meshwave_node::{NodeConfig, NodeRuntime};
//! use meshwave_transport::TcpTransport;
//!
//! let node = NodeRuntime::new(
//!     neighbors,
//!     inventory,
//!     Arc::new(TcpTransport::new()),
//!     Arc::new(TracingEventSink::new()),
//!     NodeConfig::default(),
//! );
//! let handle = node.start().await?;
//!
//! // Run the wave from this node and wait for its part of the tree
//! node.start_wave();
//! let snapshot = node.wait_for_tree().await?;
//!
//! handle.stop().await;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod runtime;

// Re-export main types
pub use client::{
    DEFAULT_ACCESS_ADDR, DEFAULT_CLIENT_ADDR, DEFAULT_QUERY_TIMEOUT, QueryClient, ResultSet,
    run_query,
};
pub use config::NodeConfig;
pub use error::{NodeError, NodeResult};
pub use events::{ChannelEventSink, FanoutEventSink};
pub use runtime::{NodeHandle, NodeRuntime};
