//! Request table for reverse-path routing
//!
//! The [`RequestTable`] remembers, for every search a node has handled,
//! where responses must go. Entries live for the whole process; there is no
//! eviction.

use std::collections::HashMap;
use std::net::SocketAddr;

use meshwave_core::RequestId;

use crate::error::{SearchError, SearchResult};

/// Where a response for a given request should be forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseRoute {
    /// This node is the client's access node
    Client(SocketAddr),
    /// Back toward the node that forwarded the query
    ReversePath(SocketAddr),
}

impl ResponseRoute {
    /// The next hop
    pub fn target(&self) -> SocketAddr {
        match self {
            Self::Client(addr) | Self::ReversePath(addr) => *addr,
        }
    }
}

/// Per-node search state
#[derive(Debug, Default)]
pub struct RequestTable {
    /// Queries received from other nodes: request id -> return address
    seen: HashMap<RequestId, SocketAddr>,
    /// Searches submitted by a client at this node: request id -> client
    client_requests: HashMap<RequestId, SocketAddr>,
}

impl RequestTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the id was seen as a query or submitted by a client here
    pub fn knows(&self, id: &RequestId) -> bool {
        self.seen.contains_key(id) || self.client_requests.contains_key(id)
    }

    /// Record a query from another node
    ///
    /// Fails if the id is already known in either role, so a request is
    /// flooded onward at most once.
    pub fn record_query(&mut self, id: RequestId, return_address: SocketAddr) -> SearchResult<()> {
        if self.knows(&id) {
            return Err(SearchError::AlreadySeen(id));
        }
        self.seen.insert(id, return_address);
        Ok(())
    }

    /// Record a search submitted by a client at this node
    pub fn record_client(&mut self, id: RequestId, client: SocketAddr) -> SearchResult<()> {
        if self.knows(&id) {
            return Err(SearchError::AlreadySeen(id));
        }
        self.client_requests.insert(id, client);
        Ok(())
    }

    /// Decide where a response for `id` goes
    ///
    /// A request this node originated for a client takes precedence only when
    /// the id was never seen as a forwarded query.
    pub fn route_response(&self, id: &RequestId) -> SearchResult<ResponseRoute> {
        match (self.seen.get(id), self.client_requests.get(id)) {
            (None, Some(client)) => Ok(ResponseRoute::Client(*client)),
            (Some(back), _) => Ok(ResponseRoute::ReversePath(*back)),
            (None, None) => Err(SearchError::NoReturnPath(*id)),
        }
    }

    /// Return address recorded for a forwarded query
    pub fn return_address(&self, id: &RequestId) -> Option<SocketAddr> {
        self.seen.get(id).copied()
    }

    /// Client address recorded for a locally originated search
    pub fn client_address(&self, id: &RequestId) -> Option<SocketAddr> {
        self.client_requests.get(id).copied()
    }

    /// Number of forwarded queries recorded
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Number of client searches recorded
    pub fn client_count(&self) -> usize {
        self.client_requests.len()
    }
}
