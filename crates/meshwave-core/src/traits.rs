//! Collaborator traits for Meshwave nodes
//!
//! These traits are the seams between the protocol state machines and the
//! outside world.
//!
//! ## Key Traits
//!
//! - [`Inventory`]: Items a node can answer searches about
//! - [`EventSink`]: Observability events, one per message handled
//! - [`ResultCollector`]: Client-side collection of search hits

use std::net::SocketAddr;

use parking_lot::Mutex;

use crate::event::{DropReason, NodeEvent};
use crate::message::MessageKind;

/// Local content lookup
///
/// Implementations must match case-insensitively on substrings: searching
/// for `"ubuntu"` finds `"Ubuntu-22.04.iso"`.
pub trait Inventory: Send + Sync {
    /// Names of all local items containing `term`
    fn find_matching(&self, term: &str) -> Vec<String>;
}

/// In-memory inventory backed by a fixed list of names
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    items: Vec<String>,
}

impl StaticInventory {
    /// Create an inventory holding `items`
    pub fn new<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Self {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    /// An inventory with no items
    pub fn empty() -> Self {
        Self::default()
    }

    /// All item names
    pub fn items(&self) -> &[String] {
        &self.items
    }
}

impl Inventory for StaticInventory {
    fn find_matching(&self, term: &str) -> Vec<String> {
        let needle = term.to_lowercase();
        self.items
            .iter()
            .filter(|item| item.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }
}

/// Receiver of node events
pub trait EventSink: Send + Sync {
    /// Record one event
    fn record(&self, event: NodeEvent);
}

/// Sink that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn record(&self, _event: NodeEvent) {}
}

/// Sink that keeps every event in memory, for tests and diagnostics
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<NodeEvent>>,
}

impl MemoryEventSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far
    pub fn events(&self) -> Vec<NodeEvent> {
        self.events.lock().clone()
    }

    /// Number of events recorded so far
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// True if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Count sends of a given kind
    pub fn sent_count(&self, kind: MessageKind) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, NodeEvent::MessageSent { kind: k, .. } if *k == kind))
            .count()
    }

    /// Count drops for a given reason
    pub fn dropped_count(&self, reason: DropReason) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, NodeEvent::MessageDropped { reason: r, .. } if *r == reason))
            .count()
    }

    /// Count protocol violations
    pub fn violation_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, NodeEvent::ProtocolViolation { .. }))
            .count()
    }

    /// Forget all recorded events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, event: NodeEvent) {
        self.events.lock().push(event);
    }
}

/// Client-side receiver of search hits
///
/// Invoked once per response reaching the client; aggregation of duplicate
/// hits is the collector's job.
pub trait ResultCollector: Send + Sync {
    /// Report one hit
    fn report(&self, item: &str, responder: SocketAddr);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::NodeId;

    #[test]
    fn test_static_inventory_case_insensitive_substring() {
        let inventory = StaticInventory::new(["Ubuntu-22.iso", "debian-12.iso", "notes.txt"]);

        assert_eq!(inventory.find_matching("ubuntu"), vec!["Ubuntu-22.iso"]);
        assert_eq!(inventory.find_matching("ISO").len(), 2);
        assert!(inventory.find_matching("arch").is_empty());
    }

    #[test]
    fn test_empty_term_matches_everything() {
        let inventory = StaticInventory::new(["a", "b"]);
        assert_eq!(inventory.find_matching("").len(), 2);
        assert!(StaticInventory::empty().find_matching("").is_empty());
    }

    #[test]
    fn test_memory_sink_counters() {
        let sink = MemoryEventSink::new();
        let to: SocketAddr = "127.0.0.1:9".parse().unwrap();

        sink.record(NodeEvent::sent(NodeId(1), to, MessageKind::Query));
        sink.record(NodeEvent::sent(NodeId(1), to, MessageKind::Query));
        sink.record(NodeEvent::sent(NodeId(1), to, MessageKind::Response));
        sink.record(NodeEvent::dropped(
            NodeId(1),
            Some(MessageKind::Query),
            DropReason::Duplicate,
        ));
        sink.record(NodeEvent::violation(NodeId(1), "test"));

        assert_eq!(sink.len(), 5);
        assert_eq!(sink.sent_count(MessageKind::Query), 2);
        assert_eq!(sink.sent_count(MessageKind::Response), 1);
        assert_eq!(sink.dropped_count(DropReason::Duplicate), 1);
        assert_eq!(sink.violation_count(), 1);

        sink.clear();
        assert!(sink.is_empty());
    }
}
