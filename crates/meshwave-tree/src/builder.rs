//! Per-node wave state machine
//!
//! The root floods a `Wave`. A node adopts the first waver as its parent,
//! acknowledges it with `ParentAck` and floods the wave onward; every later
//! waver gets a `Reject`. Each reply the node receives classifies one
//! neighbor as child or rejecting, and once every neighbor is classified the
//! node's part of the tree is final.
//!
//! The root counts a virtual parent so the same termination rule holds for
//! every node.

use std::collections::BTreeSet;
use std::sync::Arc;

use meshwave_core::{
    DropReason, EventSink, MessageKind, NeighborTable, NodeEvent, NodeId, Outbound,
    ProtocolViolation, WireMessage,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

/// Result of a wave handler
pub type TreeResult<T> = Result<T, ProtocolViolation>;

/// Progress of the current run on one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TreePhase {
    /// Not reached by the wave yet
    #[default]
    Idle,
    /// Joined the tree, waiting for replies
    Active,
    /// Every neighbor classified
    Done,
}

/// Read-only view of a node's tree state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub phase: TreePhase,
    pub is_root: bool,
    pub parent: Option<NodeId>,
    pub children: BTreeSet<NodeId>,
    pub rejected_by: BTreeSet<NodeId>,
}

impl TreeSnapshot {
    /// True once every neighbor is classified
    pub fn is_done(&self) -> bool {
        self.phase == TreePhase::Done
    }
}

/// Per-node spanning-tree construction
pub struct SpanningTreeBuilder {
    neighbors: Arc<NeighborTable>,
    sink: Arc<dyn EventSink>,
    is_root: bool,
    parent: Option<NodeId>,
    children: BTreeSet<NodeId>,
    rejected_by: BTreeSet<NodeId>,
    /// Neighbors this node sent a Wave to
    waved: BTreeSet<NodeId>,
    completion_reported: bool,
}

impl SpanningTreeBuilder {
    /// Create a builder in the idle phase
    pub fn new(neighbors: Arc<NeighborTable>, sink: Arc<dyn EventSink>) -> Self {
        let mut builder = Self {
            neighbors,
            sink,
            is_root: false,
            parent: None,
            children: BTreeSet::new(),
            rejected_by: BTreeSet::new(),
            waved: BTreeSet::new(),
            completion_reported: false,
        };
        // An isolated node has nothing to wait for
        builder.check_completion();
        builder
    }

    fn node(&self) -> NodeId {
        self.neighbors.local_id()
    }

    /// Current phase
    pub fn phase(&self) -> TreePhase {
        let joined = self.is_root || self.parent.is_some();
        if !joined && !self.neighbors.is_empty() {
            return TreePhase::Idle;
        }

        let virtual_parent = usize::from(self.is_root);
        let expected = self.neighbors.len() + virtual_parent;
        let resolved =
            self.children.len() + self.rejected_by.len() + usize::from(joined);

        if resolved == expected {
            TreePhase::Done
        } else {
            TreePhase::Active
        }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> TreeSnapshot {
        TreeSnapshot {
            phase: self.phase(),
            is_root: self.is_root,
            parent: self.parent,
            children: self.children.clone(),
            rejected_by: self.rejected_by.clone(),
        }
    }

    /// Discard the current run
    pub fn reset(&mut self) {
        self.is_root = false;
        self.parent = None;
        self.children.clear();
        self.rejected_by.clear();
        self.waved.clear();
        self.completion_reported = false;
        self.check_completion();
    }

    /// Start a run with this node as root
    ///
    /// Ignored if this node already joined a run.
    pub fn start_as_root(&mut self) -> Vec<Outbound> {
        if self.is_root || self.parent.is_some() {
            debug!(node = %self.node(), "already part of a run, not starting as root");
            return Vec::new();
        }

        self.is_root = true;
        info!(node = %self.node(), neighbors = self.neighbors.len(), "starting wave as root");

        let outbound = self.wave_all_except(None);
        self.check_completion();
        outbound
    }

    /// Handle a Wave from `from`
    pub fn handle_wave(&mut self, from: NodeId) -> TreeResult<Vec<Outbound>> {
        let Some(sender) = self.neighbors.get(from).copied() else {
            return Err(self.violation(ProtocolViolation::UnknownSender {
                kind: MessageKind::Wave,
                sender: from,
            }));
        };

        if !self.is_root && self.parent.is_none() {
            self.parent = Some(from);
            debug!(node = %self.node(), parent = %from, "adopted parent");

            let mut outbound = vec![Outbound::new(
                sender.address,
                WireMessage::ParentAck { sender: self.node() },
            )];
            outbound.extend(self.wave_all_except(Some(from)));
            self.check_completion();
            return Ok(outbound);
        }

        if self.parent == Some(from) {
            trace!(node = %self.node(), from = %from, "duplicate wave from parent");
            self.sink.record(NodeEvent::dropped(
                self.node(),
                Some(MessageKind::Wave),
                DropReason::Duplicate,
            ));
            return Ok(Vec::new());
        }

        trace!(node = %self.node(), from = %from, "rejecting wave");
        Ok(vec![Outbound::new(
            sender.address,
            WireMessage::Reject { sender: self.node() },
        )])
    }

    /// Handle a ParentAck from `from`
    pub fn handle_parent_ack(&mut self, from: NodeId) -> TreeResult<()> {
        self.check_reply(MessageKind::ParentAck, from, &self.rejected_by)?;
        if self.children.insert(from) {
            debug!(node = %self.node(), child = %from, "child joined");
        }
        self.check_completion();
        Ok(())
    }

    /// Handle a Reject from `from`
    pub fn handle_reject(&mut self, from: NodeId) -> TreeResult<()> {
        self.check_reply(MessageKind::Reject, from, &self.children)?;
        if self.rejected_by.insert(from) {
            debug!(node = %self.node(), neighbor = %from, "wave rejected");
        }
        self.check_completion();
        Ok(())
    }

    /// Validate a reply against what this node sent and received so far
    fn check_reply(
        &self,
        kind: MessageKind,
        from: NodeId,
        opposite: &BTreeSet<NodeId>,
    ) -> TreeResult<()> {
        let violation = if !self.neighbors.contains(from) {
            Some(ProtocolViolation::UnknownSender { kind, sender: from })
        } else if !self.waved.contains(&from) {
            Some(ProtocolViolation::UnsolicitedReply { kind, sender: from })
        } else if opposite.contains(&from) {
            Some(ProtocolViolation::ConflictingReply { kind, sender: from })
        } else {
            None
        };

        match violation {
            Some(v) => Err(self.violation(v)),
            None => Ok(()),
        }
    }

    fn violation(&self, violation: ProtocolViolation) -> ProtocolViolation {
        warn!(node = %self.node(), %violation, "ignoring wave message");
        self.sink
            .record(NodeEvent::violation(self.node(), &violation));
        violation
    }

    fn wave_all_except(&mut self, except: Option<NodeId>) -> Vec<Outbound> {
        let node = self.node();
        let targets: Vec<_> = self
            .neighbors
            .neighbors()
            .iter()
            .filter(|n| Some(n.id) != except)
            .copied()
            .collect();

        targets
            .into_iter()
            .map(|n| {
                self.waved.insert(n.id);
                Outbound::new(n.address, WireMessage::Wave { sender: node })
            })
            .collect()
    }

    fn check_completion(&mut self) {
        if self.completion_reported || self.phase() != TreePhase::Done {
            return;
        }
        self.completion_reported = true;

        let children: Vec<_> = self.children.iter().copied().collect();
        info!(
            node = %self.node(),
            parent = ?self.parent,
            children = ?children,
            rejected = self.rejected_by.len(),
            "tree complete"
        );
        self.sink
            .record(NodeEvent::tree_completed(self.node(), self.parent, children));
    }
}

impl std::fmt::Debug for SpanningTreeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpanningTreeBuilder")
            .field("node", &self.node())
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
