//! Flooding search router
//!
//! The [`SearchRouter`] implements the per-node search state machine. It
//! never performs I/O: every handler returns the sends it wants and records
//! drop events on the sink.
//!
//! ## Algorithm
//!
//! 1. **DEDUP**: A request id is processed once per node; repeats are dropped
//! 2. **ANSWER**: Local matches go straight to the node the query came from
//! 3. **FLOOD**: While TTL allows, the query moves on to every other neighbor
//!    with this node as its new return address
//! 4. **REVERSE**: Responses retrace the recorded return addresses hop by hop

use std::net::SocketAddr;
use std::sync::Arc;

use meshwave_core::{
    ClientRequest, DropReason, EventSink, Inventory, MessageKind, NeighborTable, NodeEvent,
    NodeId, Outbound, QueryRequest, QueryResponse, RequestId, WireMessage,
};
use tracing::{debug, trace};

use crate::table::{RequestTable, ResponseRoute};

/// TTL given to a query when a client submits it
pub const DEFAULT_INITIAL_TTL: u32 = 5;

/// Per-node flooding search
pub struct SearchRouter {
    /// Topology of this node
    neighbors: Arc<NeighborTable>,
    /// Local items
    inventory: Arc<dyn Inventory>,
    /// Drop events
    sink: Arc<dyn EventSink>,
    /// Request bookkeeping
    table: RequestTable,
    /// TTL for queries originated here
    initial_ttl: u32,
}

impl SearchRouter {
    /// Create a router with the default initial TTL
    pub fn new(
        neighbors: Arc<NeighborTable>,
        inventory: Arc<dyn Inventory>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            neighbors,
            inventory,
            sink,
            table: RequestTable::new(),
            initial_ttl: DEFAULT_INITIAL_TTL,
        }
    }

    /// Set the TTL for queries originated at this node
    pub fn with_initial_ttl(mut self, ttl: u32) -> Self {
        self.initial_ttl = ttl;
        self
    }

    /// TTL for queries originated at this node
    pub fn initial_ttl(&self) -> u32 {
        self.initial_ttl
    }

    /// Request bookkeeping
    pub fn table(&self) -> &RequestTable {
        &self.table
    }

    fn node(&self) -> NodeId {
        self.neighbors.local_id()
    }

    fn address(&self) -> SocketAddr {
        self.neighbors.local_address()
    }

    fn drop_event(&self, kind: MessageKind, reason: DropReason) {
        self.sink
            .record(NodeEvent::dropped(self.node(), Some(kind), reason));
    }

    /// Responses for every local match, sent to `target`
    fn answer_locally(&self, request_id: RequestId, term: &str, target: SocketAddr) -> Vec<Outbound> {
        let responder = self.address();
        self.inventory
            .find_matching(term)
            .into_iter()
            .map(|item| {
                Outbound::new(
                    target,
                    WireMessage::Response(QueryResponse {
                        request_id,
                        item,
                        responder,
                    }),
                )
            })
            .collect()
    }

    /// Query copies for every neighbor not at `except`
    fn flood(
        &self,
        request_id: RequestId,
        term: &str,
        ttl: u32,
        except: Option<SocketAddr>,
    ) -> Vec<Outbound> {
        let return_address = self.address();
        self.neighbors
            .neighbors()
            .iter()
            .filter(|n| Some(n.address) != except)
            .map(|n| {
                Outbound::new(
                    n.address,
                    WireMessage::Query(QueryRequest {
                        request_id,
                        term: term.to_string(),
                        ttl,
                        return_address,
                    }),
                )
            })
            .collect()
    }

    /// Handle a query forwarded by another node
    pub fn handle_query(&mut self, query: QueryRequest) -> Vec<Outbound> {
        let QueryRequest {
            request_id,
            term,
            ttl,
            return_address,
        } = query;

        if self.table.record_query(request_id, return_address).is_err() {
            trace!(node = %self.node(), request = %request_id.short_id(), "duplicate query");
            self.drop_event(MessageKind::Query, DropReason::Duplicate);
            return Vec::new();
        }

        let mut outbound = self.answer_locally(request_id, &term, return_address);
        let matches = outbound.len();

        if ttl > 1 {
            outbound.extend(self.flood(request_id, &term, ttl - 1, Some(return_address)));
        } else {
            self.drop_event(MessageKind::Query, DropReason::TtlExhausted);
        }

        debug!(
            node = %self.node(),
            request = %request_id.short_id(),
            %term,
            ttl,
            matches,
            forwards = outbound.len() - matches,
            "query handled"
        );
        outbound
    }

    /// Handle a search submitted by a client at this node
    pub fn handle_client_request(&mut self, request: ClientRequest) -> Vec<Outbound> {
        let ClientRequest {
            request_id,
            term,
            client_address,
        } = request;

        if self.table.record_client(request_id, client_address).is_err() {
            trace!(node = %self.node(), request = %request_id.short_id(), "duplicate client request");
            self.drop_event(MessageKind::ClientRequest, DropReason::Duplicate);
            return Vec::new();
        }

        let mut outbound = self.answer_locally(request_id, &term, client_address);
        let matches = outbound.len();

        if self.initial_ttl > 0 {
            outbound.extend(self.flood(request_id, &term, self.initial_ttl, None));
        }

        debug!(
            node = %self.node(),
            request = %request_id.short_id(),
            %term,
            client = %client_address,
            matches,
            "client request accepted"
        );
        outbound
    }

    /// Handle a response travelling back toward a client
    pub fn handle_response(&mut self, response: QueryResponse) -> Vec<Outbound> {
        match self.table.route_response(&response.request_id) {
            Ok(route) => {
                trace!(
                    node = %self.node(),
                    request = %response.request_id.short_id(),
                    item = %response.item,
                    to_client = matches!(route, ResponseRoute::Client(_)),
                    "forwarding response"
                );
                vec![Outbound::new(route.target(), WireMessage::Response(response))]
            }
            Err(e) => {
                debug!(node = %self.node(), error = %e, "dropping response");
                self.drop_event(MessageKind::Response, DropReason::UnknownRequest);
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for SearchRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchRouter")
            .field("node", &self.node())
            .field("initial_ttl", &self.initial_ttl)
            .field("table", &self.table)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshwave_core::{LocalNode, MemoryEventSink, Neighbor, StaticInventory};

    fn addr(id: u8) -> SocketAddr {
        SocketAddr::from(([127, 0, 1, id], 30000))
    }

    fn client_addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 40000))
    }

    /// Node 2 in the middle of 1 - 2 - 3, with a fourth neighbor 4
    fn router(items: &[&str]) -> (SearchRouter, Arc<MemoryEventSink>) {
        let table = NeighborTable::new(
            LocalNode::new(2, addr(2)),
            vec![
                Neighbor::new(1, addr(1), 1),
                Neighbor::new(3, addr(3), 1),
                Neighbor::new(4, addr(4), 1),
            ],
        )
        .unwrap();
        let sink = Arc::new(MemoryEventSink::new());
        let router = SearchRouter::new(
            Arc::new(table),
            Arc::new(StaticInventory::new(items.iter().copied())),
            sink.clone(),
        );
        (router, sink)
    }

    fn query(id: RequestId, ttl: u32, from: SocketAddr) -> QueryRequest {
        QueryRequest {
            request_id: id,
            term: "ubuntu".into(),
            ttl,
            return_address: from,
        }
    }

    fn targets(outbound: &[Outbound], kind: MessageKind) -> Vec<SocketAddr> {
        outbound
            .iter()
            .filter(|o| o.message.kind() == kind)
            .map(|o| o.target)
            .collect()
    }

    #[test]
    fn test_query_floods_except_sender() {
        let (mut router, _) = router(&[]);
        let id = RequestId::generate();

        let out = router.handle_query(query(id, 5, addr(1)));

        assert_eq!(targets(&out, MessageKind::Query), vec![addr(3), addr(4)]);
        for o in &out {
            match &o.message {
                WireMessage::Query(q) => {
                    assert_eq!(q.ttl, 4);
                    assert_eq!(q.return_address, addr(2));
                    assert_eq!(q.request_id, id);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_local_match_answered_to_return_address() {
        let (mut router, _) = router(&["Ubuntu-22.iso", "debian.iso"]);
        let out = router.handle_query(query(RequestId::generate(), 5, addr(1)));

        let responses: Vec<_> = out
            .iter()
            .filter_map(|o| match &o.message {
                WireMessage::Response(r) => Some((o.target, r.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].0, addr(1));
        assert_eq!(responses[0].1.item, "Ubuntu-22.iso");
        assert_eq!(responses[0].1.responder, addr(2));
    }

    #[test]
    fn test_duplicate_query_floods_once() {
        let (mut router, sink) = router(&["ubuntu.iso"]);
        let id = RequestId::generate();

        let first = router.handle_query(query(id, 5, addr(1)));
        let second = router.handle_query(query(id, 5, addr(3)));

        assert_eq!(targets(&first, MessageKind::Query).len(), 2);
        assert!(second.is_empty());
        assert_eq!(sink.dropped_count(DropReason::Duplicate), 1);
        assert_eq!(router.table().return_address(&id), Some(addr(1)));
    }

    #[test]
    fn test_ttl_one_answers_but_stops() {
        let (mut router, sink) = router(&["ubuntu.iso"]);
        let out = router.handle_query(query(RequestId::generate(), 1, addr(1)));

        assert!(targets(&out, MessageKind::Query).is_empty());
        assert_eq!(targets(&out, MessageKind::Response), vec![addr(1)]);
        assert_eq!(sink.dropped_count(DropReason::TtlExhausted), 1);
    }

    #[test]
    fn test_ttl_zero_never_floods() {
        let (mut router, _) = router(&[]);
        let out = router.handle_query(query(RequestId::generate(), 0, addr(1)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_query_from_non_neighbor_floods_everywhere() {
        let (mut router, _) = router(&[]);
        let out = router.handle_query(query(RequestId::generate(), 3, client_addr()));
        assert_eq!(
            targets(&out, MessageKind::Query),
            vec![addr(1), addr(3), addr(4)]
        );
    }

    #[test]
    fn test_client_request() {
        let (mut router, _) = router(&["ubuntu.iso"]);
        let id = RequestId::generate();

        let out = router.handle_client_request(ClientRequest {
            request_id: id,
            term: "UBUNTU".into(),
            client_address: client_addr(),
        });

        assert_eq!(targets(&out, MessageKind::Response), vec![client_addr()]);
        assert_eq!(
            targets(&out, MessageKind::Query),
            vec![addr(1), addr(3), addr(4)]
        );
        assert!(out.iter().all(|o| match &o.message {
            WireMessage::Query(q) => q.ttl == DEFAULT_INITIAL_TTL,
            _ => true,
        }));
        assert_eq!(router.table().client_address(&id), Some(client_addr()));
    }

    #[test]
    fn test_client_request_duplicate_dropped() {
        let (mut router, sink) = router(&[]);
        let request = ClientRequest {
            request_id: RequestId::generate(),
            term: "x".into(),
            client_address: client_addr(),
        };

        assert_eq!(router.handle_client_request(request.clone()).len(), 3);
        assert!(router.handle_client_request(request).is_empty());
        assert_eq!(sink.dropped_count(DropReason::Duplicate), 1);
    }

    #[test]
    fn test_own_query_echo_is_duplicate() {
        let (mut router, sink) = router(&[]);
        let id = RequestId::generate();
        router.handle_client_request(ClientRequest {
            request_id: id,
            term: "x".into(),
            client_address: client_addr(),
        });

        let out = router.handle_query(query(id, 3, addr(3)));
        assert!(out.is_empty());
        assert_eq!(sink.dropped_count(DropReason::Duplicate), 1);
    }

    #[test]
    fn test_custom_initial_ttl() {
        let (router, _) = router(&[]);
        let mut router = router.with_initial_ttl(2);
        assert_eq!(router.initial_ttl(), 2);

        let out = router.handle_client_request(ClientRequest {
            request_id: RequestId::generate(),
            term: "x".into(),
            client_address: client_addr(),
        });
        assert!(out.iter().all(|o| matches!(&o.message, WireMessage::Query(q) if q.ttl == 2)));
    }

    #[test]
    fn test_response_routing() {
        let (mut router, sink) = router(&[]);
        let forwarded = RequestId::generate();
        let originated = RequestId::generate();

        router.handle_query(query(forwarded, 5, addr(1)));
        router.handle_client_request(ClientRequest {
            request_id: originated,
            term: "x".into(),
            client_address: client_addr(),
        });

        let response = |id| QueryResponse {
            request_id: id,
            item: "ubuntu.iso".into(),
            responder: addr(3),
        };

        let out = router.handle_response(response(forwarded));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target, addr(1));
        assert_eq!(out[0].message, WireMessage::Response(response(forwarded)));

        let out = router.handle_response(response(originated));
        assert_eq!(out[0].target, client_addr());

        let out = router.handle_response(response(RequestId::generate()));
        assert!(out.is_empty());
        assert_eq!(sink.dropped_count(DropReason::UnknownRequest), 1);
    }

    #[test]
    fn test_isolated_node_answers_only() {
        let table = NeighborTable::new(LocalNode::new(1, addr(1)), vec![]).unwrap();
        let mut router = SearchRouter::new(
            Arc::new(table),
            Arc::new(StaticInventory::new(["ubuntu.iso"])),
            Arc::new(MemoryEventSink::new()),
        );

        let out = router.handle_client_request(ClientRequest {
            request_id: RequestId::generate(),
            term: "ubuntu".into(),
            client_address: client_addr(),
        });
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target, client_addr());
    }
}
