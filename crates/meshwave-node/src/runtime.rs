//! Node runtime
//!
//! The [`NodeRuntime`] is the composition root of one node. It owns both
//! protocol state machines behind a single mutex, decodes inbound messages,
//! routes them by kind and hands the resulting sends to the dispatcher once
//! the lock is released.
//!
//! Inbound messages arrive either over TCP ([`NodeRuntime::serve`], one
//! frame per connection) or from an in-memory inbox
//! ([`NodeRuntime::serve_inbox`]).

use std::net::SocketAddr;
use std::sync::Arc;

use meshwave_core::{
    ConfigError, DropReason, EventSink, Inventory, LocalNode, NeighborTable, NodeEvent, Transport,
    WireMessage,
};
use meshwave_logging::node_span;
use meshwave_search::SearchRouter;
use meshwave_transport::{Dispatcher, read_message};
use meshwave_tree::{SpanningTreeBuilder, TreeSnapshot};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, trace, warn};

use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};
use crate::events::{ChannelEventSink, FanoutEventSink};

/// Protocol state of one node
struct NodeState {
    search: SearchRouter,
    tree: SpanningTreeBuilder,
}

/// One node: both protocols plus the plumbing around them
pub struct NodeRuntime {
    local: LocalNode,
    neighbors: Arc<NeighborTable>,
    config: NodeConfig,
    state: Mutex<NodeState>,
    dispatcher: Dispatcher,
    sink: Arc<dyn EventSink>,
    events: ChannelEventSink,
    tree_tx: watch::Sender<TreeSnapshot>,
}

impl NodeRuntime {
    /// Assemble a node
    ///
    /// Every event goes to `sink` and to the runtime's broadcast channel.
    pub fn new(
        neighbors: NeighborTable,
        inventory: Arc<dyn Inventory>,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn EventSink>,
        config: NodeConfig,
    ) -> Arc<Self> {
        let local = neighbors.local();
        let neighbors = Arc::new(neighbors);
        let events = ChannelEventSink::new(config.event_channel_capacity);
        let sink: Arc<dyn EventSink> = Arc::new(
            FanoutEventSink::new()
                .with(sink)
                .with(Arc::new(events.clone())),
        );

        let search = SearchRouter::new(Arc::clone(&neighbors), inventory, Arc::clone(&sink))
            .with_initial_ttl(config.initial_ttl);
        let tree = SpanningTreeBuilder::new(Arc::clone(&neighbors), Arc::clone(&sink));
        let (tree_tx, _) = watch::channel(tree.snapshot());

        let dispatcher = Dispatcher::new(
            local.id,
            transport,
            Arc::clone(&sink),
            config.send_policy,
        );

        Arc::new(Self {
            local,
            neighbors,
            config,
            state: Mutex::new(NodeState { search, tree }),
            dispatcher,
            sink,
            events,
            tree_tx,
        })
    }

    /// This node's identity
    pub fn local(&self) -> LocalNode {
        self.local
    }

    /// This node's neighbors
    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    /// The configuration in effect
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Receive every event recorded from now on
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }

    /// Handle one decoded message
    pub fn handle_message(&self, message: WireMessage) {
        let node = self.local.id;
        let kind = message.kind();
        self.sink.record(NodeEvent::received(node, kind));
        trace!(%node, %kind, "handling message");

        let outbound = {
            let mut state = self.state.lock();
            let outbound = match message {
                WireMessage::Query(query) => state.search.handle_query(query),
                WireMessage::Response(response) => state.search.handle_response(response),
                WireMessage::ClientRequest(request) => state.search.handle_client_request(request),
                WireMessage::Wave { sender } => {
                    state.tree.handle_wave(sender).unwrap_or_default()
                }
                // Violations are recorded by the builder and leave state untouched
                WireMessage::ParentAck { sender } => {
                    let _ = state.tree.handle_parent_ack(sender);
                    Vec::new()
                }
                WireMessage::Reject { sender } => {
                    let _ = state.tree.handle_reject(sender);
                    Vec::new()
                }
            };
            if kind.is_wave() {
                self.tree_tx.send_replace(state.tree.snapshot());
            }
            outbound
        };

        self.dispatcher.dispatch(outbound);
    }

    /// Start a spanning-tree run with this node as root
    pub fn start_wave(&self) {
        let outbound = {
            let mut state = self.state.lock();
            let outbound = state.tree.start_as_root();
            self.tree_tx.send_replace(state.tree.snapshot());
            outbound
        };
        self.dispatcher.dispatch(outbound);
    }

    /// Discard the current spanning-tree run
    pub fn reset_tree(&self) {
        let mut state = self.state.lock();
        state.tree.reset();
        self.tree_tx.send_replace(state.tree.snapshot());
    }

    /// Current spanning-tree state
    pub fn tree_snapshot(&self) -> TreeSnapshot {
        self.tree_tx.borrow().clone()
    }

    /// Watch spanning-tree state changes
    pub fn watch_tree(&self) -> watch::Receiver<TreeSnapshot> {
        self.tree_tx.subscribe()
    }

    /// Wait until this node's part of the tree is complete
    pub async fn wait_for_tree(&self) -> NodeResult<TreeSnapshot> {
        let mut rx = self.watch_tree();
        let snapshot = rx
            .wait_for(TreeSnapshot::is_done)
            .await
            .map_err(|e| NodeError::Channel(e.to_string()))?;
        Ok(snapshot.clone())
    }

    /// Number of searches this node has handled, forwarded and originated
    pub fn search_counts(&self) -> (usize, usize) {
        let state = self.state.lock();
        let table = state.search.table();
        (table.seen_count(), table.client_count())
    }

    /// Wait for every send issued so far to finish
    pub async fn drain(&self) {
        self.dispatcher.drain().await;
    }

    /// Bind the listening socket
    ///
    /// Uses the configured listen address if set, the topology address
    /// otherwise.
    pub async fn bind(&self) -> NodeResult<TcpListener> {
        let addr = self.config.listen_addr.unwrap_or(self.local.address);
        TcpListener::bind(addr).await.map_err(|e| {
            NodeError::Config(ConfigError::Bind {
                addr,
                reason: e.to_string(),
            })
        })
    }

    /// Accept connections until `shutdown` is cancelled
    ///
    /// Each connection is handled on its own task and carries one message.
    pub async fn serve(self: Arc<Self>, listener: TcpListener, shutdown: CancellationToken) {
        let span = node_span(&self.local);
        async move {
            info!(addr = ?listener.local_addr().ok(), "listening");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            let node = Arc::clone(&self);
                            tokio::spawn(
                                async move { node.handle_connection(stream, peer).await }
                                    .in_current_span(),
                            );
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    },
                }
            }
            info!("stopped listening");
        }
        .instrument(span)
        .await
    }

    async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) {
        match read_message(&mut stream).await {
            Ok(message) => self.handle_message(message),
            Err(e) => {
                debug!(%peer, error = %e, "malformed inbound message");
                self.sink.record(NodeEvent::dropped(
                    self.local.id,
                    None,
                    DropReason::Malformed,
                ));
            }
        }
    }

    /// Handle messages from an in-memory inbox until `shutdown` is cancelled
    /// or the inbox closes
    pub async fn serve_inbox(
        self: Arc<Self>,
        mut inbox: mpsc::Receiver<WireMessage>,
        shutdown: CancellationToken,
    ) {
        let span = node_span(&self.local);
        async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    message = inbox.recv() => match message {
                        Some(message) => self.handle_message(message),
                        None => break,
                    },
                }
            }
            debug!("inbox closed");
        }
        .instrument(span)
        .await
    }

    /// Bind and serve on a background task
    pub async fn start(self: &Arc<Self>) -> NodeResult<NodeHandle> {
        let listener = self.bind().await?;
        self.spawn_on(listener)
    }

    /// Serve an already bound listener on a background task
    pub fn spawn_on(self: &Arc<Self>, listener: TcpListener) -> NodeResult<NodeHandle> {
        let local_addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(self).serve(listener, shutdown.clone()));
        Ok(NodeHandle {
            runtime: Arc::clone(self),
            local_addr,
            shutdown,
            task,
        })
    }

    /// Serve an in-memory inbox on a background task
    pub fn spawn_inbox(self: &Arc<Self>, inbox: mpsc::Receiver<WireMessage>) -> NodeHandle {
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(self).serve_inbox(inbox, shutdown.clone()));
        NodeHandle {
            runtime: Arc::clone(self),
            local_addr: self.local.address,
            shutdown,
            task,
        }
    }
}

impl std::fmt::Debug for NodeRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRuntime")
            .field("local", &self.local)
            .field("neighbors", &self.neighbors.len())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

/// A running node
#[derive(Debug)]
pub struct NodeHandle {
    runtime: Arc<NodeRuntime>,
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl NodeHandle {
    /// The node behind this handle
    pub fn runtime(&self) -> &Arc<NodeRuntime> {
        &self.runtime
    }

    /// Address actually being served
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Token that stops the serve loop when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop serving and wait for in-flight sends
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            warn!(node = %self.runtime.local.id, error = %e, "serve task failed");
        }
        self.runtime.drain().await;
    }
}
