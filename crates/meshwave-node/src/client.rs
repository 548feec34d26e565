//! Client role
//!
//! A [`QueryClient`] submits a search to an access node and listens for the
//! responses that travel back. It only counts responses to searches it
//! submitted itself; anything else is ignored.

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use meshwave_core::{ClientRequest, RequestId, ResultCollector, Transport, WireMessage};
use meshwave_logging::client_span;
use meshwave_transport::{TcpTransport, read_message};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, trace};

use crate::error::{NodeError, NodeResult};

/// Default address the client listens on
pub const DEFAULT_CLIENT_ADDR: &str = "127.0.2.1:30000";

/// Default access node
pub const DEFAULT_ACCESS_ADDR: &str = "127.0.1.1:30000";

/// Default wait for responses
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Search results grouped by item
///
/// Duplicate hits from the same responder collapse into one.
#[derive(Debug, Default)]
pub struct ResultSet {
    inner: Mutex<ResultSetInner>,
}

#[derive(Debug, Default)]
struct ResultSetInner {
    items: BTreeMap<String, BTreeSet<SocketAddr>>,
    reports: usize,
}

impl ResultSet {
    /// Create an empty result set
    pub fn new() -> Self {
        Self::default()
    }

    /// Items found so far and where
    pub fn items(&self) -> BTreeMap<String, BTreeSet<SocketAddr>> {
        self.inner.lock().items.clone()
    }

    /// Responders holding `item`
    pub fn holders(&self, item: &str) -> BTreeSet<SocketAddr> {
        self.inner
            .lock()
            .items
            .get(item)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of distinct items
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// True if nothing was found
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Number of responses received, duplicates included
    pub fn report_count(&self) -> usize {
        self.inner.lock().reports
    }

    /// One line per item, sorted by item name
    pub fn render(&self) -> Vec<String> {
        self.inner
            .lock()
            .items
            .iter()
            .map(|(item, holders)| {
                let holders: Vec<_> = holders.iter().map(|a| a.to_string()).collect();
                format!("{} is available on: {}", item, holders.join(", "))
            })
            .collect()
    }
}

impl ResultCollector for ResultSet {
    fn report(&self, item: &str, responder: SocketAddr) {
        let mut inner = self.inner.lock();
        inner.reports += 1;
        inner
            .items
            .entry(item.to_string())
            .or_default()
            .insert(responder);
    }
}

/// Client that submits searches and collects responses
pub struct QueryClient {
    address: SocketAddr,
    transport: Arc<dyn Transport>,
    collector: Arc<dyn ResultCollector>,
    submitted: DashSet<RequestId>,
}

impl QueryClient {
    /// Create a client reachable at `address`
    pub fn new(
        address: SocketAddr,
        transport: Arc<dyn Transport>,
        collector: Arc<dyn ResultCollector>,
    ) -> Arc<Self> {
        Arc::new(Self {
            address,
            transport,
            collector,
            submitted: DashSet::new(),
        })
    }

    /// Address responses are sent to
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Submit a search for `term` through `access`
    pub async fn submit(&self, access: SocketAddr, term: impl Into<String>) -> NodeResult<RequestId> {
        let request_id = RequestId::generate();
        let term = term.into();
        self.submitted.insert(request_id);

        info!(request = %request_id.short_id(), %term, %access, "submitting search");
        let request = WireMessage::ClientRequest(ClientRequest {
            request_id,
            term,
            client_address: self.address,
        });

        if let Err(e) = self.transport.send(access, request).await {
            self.submitted.remove(&request_id);
            return Err(NodeError::Transport(e));
        }
        Ok(request_id)
    }

    /// Handle one inbound message
    pub fn handle_message(&self, message: WireMessage) {
        match message {
            WireMessage::Response(response) if self.submitted.contains(&response.request_id) => {
                trace!(item = %response.item, responder = %response.responder, "hit");
                self.collector.report(&response.item, response.responder);
            }
            other => debug!(kind = %other.kind(), "ignoring message"),
        }
    }

    /// Accept responses until `shutdown` is cancelled
    pub async fn serve(self: Arc<Self>, listener: TcpListener, shutdown: CancellationToken) {
        let span = client_span(self.address);
        async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((mut stream, peer)) => {
                            let client = Arc::clone(&self);
                            tokio::spawn(async move {
                                match read_message(&mut stream).await {
                                    Ok(message) => client.handle_message(message),
                                    Err(e) => debug!(%peer, error = %e, "malformed response"),
                                }
                            }.in_current_span());
                        }
                        Err(e) => debug!(error = %e, "accept failed"),
                    },
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Handle messages from an in-memory inbox until cancelled or closed
    pub async fn serve_inbox(
        self: Arc<Self>,
        mut inbox: mpsc::Receiver<WireMessage>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                message = inbox.recv() => match message {
                    Some(message) => self.handle_message(message),
                    None => break,
                },
            }
        }
    }
}

/// Run one search over TCP and collect what arrives within `timeout`
pub async fn run_query(
    listen: SocketAddr,
    access: SocketAddr,
    term: &str,
    timeout: Duration,
) -> NodeResult<Arc<ResultSet>> {
    let listener = TcpListener::bind(listen).await.map_err(|e| {
        NodeError::Config(meshwave_core::ConfigError::Bind {
            addr: listen,
            reason: e.to_string(),
        })
    })?;
    let address = listener.local_addr()?;

    let results = Arc::new(ResultSet::new());
    let client = QueryClient::new(address, Arc::new(TcpTransport::new()), results.clone());

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(Arc::clone(&client).serve(listener, shutdown.clone()));

    let outcome = client.submit(access, term).await;
    if outcome.is_ok() {
        tokio::time::sleep(timeout).await;
    }

    shutdown.cancel();
    let _ = server.await;
    outcome.map(|_| results)
}
