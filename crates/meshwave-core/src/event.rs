//! Node events
//!
//! A node emits one [`NodeEvent`] for every message it receives, sends or
//! drops, plus the few state transitions worth surfacing. Events replace the
//! per-node log files: where they end up is the [`EventSink`]'s business.
//!
//! [`EventSink`]: crate::traits::EventSink

use std::fmt::Display;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::NodeId;
use crate::message::MessageKind;

/// Events that occur on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeEvent {
    /// A message was decoded and handed to a protocol
    MessageReceived {
        node: NodeId,
        kind: MessageKind,
        timestamp: DateTime<Utc>,
    },

    /// A send was issued
    MessageSent {
        node: NodeId,
        to: SocketAddr,
        kind: MessageKind,
        timestamp: DateTime<Utc>,
    },

    /// A message was dropped or not propagated further
    MessageDropped {
        node: NodeId,
        kind: Option<MessageKind>,
        reason: DropReason,
        timestamp: DateTime<Utc>,
    },

    /// A send could not be delivered
    SendFailed {
        node: NodeId,
        to: SocketAddr,
        kind: MessageKind,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A message contradicted the protocol and was ignored
    ProtocolViolation {
        node: NodeId,
        detail: String,
        timestamp: DateTime<Utc>,
    },

    /// The node has classified every neighbor in the current wave run
    TreeCompleted {
        node: NodeId,
        parent: Option<NodeId>,
        children: Vec<NodeId>,
        timestamp: DateTime<Utc>,
    },
}

impl NodeEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::MessageReceived { timestamp, .. } => *timestamp,
            Self::MessageSent { timestamp, .. } => *timestamp,
            Self::MessageDropped { timestamp, .. } => *timestamp,
            Self::SendFailed { timestamp, .. } => *timestamp,
            Self::ProtocolViolation { timestamp, .. } => *timestamp,
            Self::TreeCompleted { timestamp, .. } => *timestamp,
        }
    }

    /// Get the node that emitted this event
    pub fn node(&self) -> NodeId {
        match self {
            Self::MessageReceived { node, .. } => *node,
            Self::MessageSent { node, .. } => *node,
            Self::MessageDropped { node, .. } => *node,
            Self::SendFailed { node, .. } => *node,
            Self::ProtocolViolation { node, .. } => *node,
            Self::TreeCompleted { node, .. } => *node,
        }
    }

    /// Create a message received event
    pub fn received(node: NodeId, kind: MessageKind) -> Self {
        Self::MessageReceived {
            node,
            kind,
            timestamp: Utc::now(),
        }
    }

    /// Create a message sent event
    pub fn sent(node: NodeId, to: SocketAddr, kind: MessageKind) -> Self {
        Self::MessageSent {
            node,
            to,
            kind,
            timestamp: Utc::now(),
        }
    }

    /// Create a message dropped event
    pub fn dropped(node: NodeId, kind: Option<MessageKind>, reason: DropReason) -> Self {
        Self::MessageDropped {
            node,
            kind,
            reason,
            timestamp: Utc::now(),
        }
    }

    /// Create a send failed event
    pub fn send_failed(
        node: NodeId,
        to: SocketAddr,
        kind: MessageKind,
        error: impl Display,
    ) -> Self {
        Self::SendFailed {
            node,
            to,
            kind,
            error: error.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Create a protocol violation event
    pub fn violation(node: NodeId, detail: impl Display) -> Self {
        Self::ProtocolViolation {
            node,
            detail: detail.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Create a tree completed event
    pub fn tree_completed(node: NodeId, parent: Option<NodeId>, children: Vec<NodeId>) -> Self {
        Self::TreeCompleted {
            node,
            parent,
            children,
            timestamp: Utc::now(),
        }
    }
}

impl Display for NodeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MessageReceived { node, kind, .. } => {
                write!(f, "[{}] received {}", node, kind)
            }
            Self::MessageSent { node, to, kind, .. } => {
                write!(f, "[{}] sent {} to {}", node, kind, to)
            }
            Self::MessageDropped {
                node, kind, reason, ..
            } => match kind {
                Some(kind) => write!(f, "[{}] dropped {}: {}", node, kind, reason),
                None => write!(f, "[{}] dropped message: {}", node, reason),
            },
            Self::SendFailed {
                node,
                to,
                kind,
                error,
                ..
            } => write!(f, "[{}] failed to send {} to {}: {}", node, kind, to, error),
            Self::ProtocolViolation { node, detail, .. } => {
                write!(f, "[{}] protocol violation: {}", node, detail)
            }
            Self::TreeCompleted {
                node,
                parent,
                children,
                ..
            } => {
                let parent = parent.map_or_else(|| "root".to_string(), |p| p.to_string());
                write!(
                    f,
                    "[{}] tree complete: parent={} children={:?}",
                    node,
                    parent,
                    children.iter().map(|c| c.as_u32()).collect::<Vec<_>>()
                )
            }
        }
    }
}

/// Reasons a message might be dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropReason {
    /// Request id already handled
    Duplicate,
    /// TTL reached the end of its range; matches answered, no re-flood
    TtlExhausted,
    /// Response for a request this node never saw
    UnknownRequest,
    /// Inbound bytes did not decode to a message
    Malformed,
    /// Protocol does not accept the message in the current state
    Violation,
}

impl Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Duplicate => write!(f, "Duplicate request"),
            Self::TtlExhausted => write!(f, "TTL exhausted"),
            Self::UnknownRequest => write!(f, "Unknown request"),
            Self::Malformed => write!(f, "Malformed message"),
            Self::Violation => write!(f, "Protocol violation"),
        }
    }
}
