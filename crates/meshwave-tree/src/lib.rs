//! # Meshwave Tree
//!
//! Wave (echo) algorithm that builds a spanning tree over the static
//! neighbor graph.
//!
//! ## Core Components
//!
//! - [`SpanningTreeBuilder`]: The per-node state machine
//! - [`TreeSnapshot`]: What one node knows after (or during) a run
//! - [`SpanningTree`]: Snapshots of every node stitched together and checked
//!
//! ## Example
//!
//! ```rust,ignore
//! use meshwave_tree::SpanningTreeBuilder;
//!
//! let mut tree = SpanningTreeBuilder::new(neighbors, sink);
//! dispatcher.dispatch(tree.start_as_root());
//!
//! // later, for each inbound wave message
//! let outbound = tree.handle_wave(sender)?;
//! ```

pub mod builder;
pub mod tree;

// Re-export main types
pub use builder::{SpanningTreeBuilder, TreePhase, TreeResult, TreeSnapshot};
pub use tree::{SpanningTree, TreeError};
