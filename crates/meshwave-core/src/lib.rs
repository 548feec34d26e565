//! # Meshwave Core
//!
//! Core traits, types, and errors shared by every Meshwave crate.
//!
//! A Meshwave node runs two independent protocols over the same static
//! neighbor graph: a TTL-bounded flooding search and a wave algorithm that
//! builds a spanning tree. This crate holds everything both protocols and the
//! runtime agree on, so the algorithm crates stay free of I/O.
//!
//! ## Key Types
//!
//! - [`NodeId`] / [`LocalNode`]: Node identity and address
//! - [`NeighborTable`]: Read-only view of a node's neighbors
//! - [`WireMessage`]: The six message kinds exchanged between nodes
//! - [`Outbound`]: A send decided by an algorithm, executed by the runtime
//! - [`NodeEvent`]: Observability events emitted for every message
//!
//! ## Key Traits
//!
//! - [`Transport`]: Fire-and-forget delivery of one message to one address
//! - [`Inventory`]: Local item lookup by case-insensitive substring
//! - [`EventSink`]: Receiver of [`NodeEvent`]s
//! - [`ResultCollector`]: Client-side receiver of search results

pub mod error;
pub mod event;
pub mod identity;
pub mod message;
pub mod mock_transport;
pub mod topology;
pub mod traits;
pub mod transport;

// Re-export main types
pub use error::*;
pub use event::*;
pub use identity::*;
pub use message::*;
pub use mock_transport::*;
pub use topology::*;
pub use traits::*;
pub use transport::*;
