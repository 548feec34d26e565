//! # Meshwave Search
//!
//! Gnutella-style flooding search for Meshwave nodes.
//!
//! A client hands a term to its access node. The access node answers from
//! its own inventory and floods a query to its neighbors with a TTL. Every
//! node handles a given request id once: it answers local matches to the
//! node that forwarded the query and, while TTL remains, forwards the query
//! to its other neighbors. Responses retrace the recorded return addresses
//! until they reach the client.
//!
//! ## Core Components
//!
//! - [`SearchRouter`]: The per-node state machine
//! - [`RequestTable`]: Request ids seen and their return addresses
//!
//! ## Example
//!
//! ```rust,ignore
//! use meshwave_search::SearchRouter;
//!
//! let mut router = SearchRouter::new(neighbors, inventory, sink).with_initial_ttl(5);
//! let outbound = router.handle_query(query);
//! dispatcher.dispatch(outbound);
//! ```

pub mod error;
pub mod router;
pub mod table;

// Re-export main types
pub use error::{SearchError, SearchResult};
pub use router::{DEFAULT_INITIAL_TTL, SearchRouter};
pub use table::{RequestTable, ResponseRoute};
