//! Event sinks owned by the runtime

use std::sync::Arc;

use meshwave_core::{EventSink, NodeEvent};
use tokio::sync::broadcast;

/// Sink that broadcasts every event to subscribers
///
/// Events recorded while nobody is subscribed are discarded.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: broadcast::Sender<NodeEvent>,
}

impl ChannelEventSink {
    /// Create a sink with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receive every event recorded from now on
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventSink for ChannelEventSink {
    fn record(&self, event: NodeEvent) {
        let _ = self.tx.send(event);
    }
}

/// Sink that forwards every event to several sinks in order
#[derive(Clone, Default)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    /// Create an empty fanout
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// True if there are no sinks
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutEventSink {
    fn record(&self, event: NodeEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.record(event.clone());
            }
            last.record(event);
        }
    }
}
