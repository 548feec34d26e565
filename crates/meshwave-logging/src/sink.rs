//! Tracing-backed event sink
//!
//! [`TracingEventSink`] turns every [`NodeEvent`] into a structured tracing
//! event under the `meshwave::events` target, so node activity ends up in
//! whatever the subscriber writes: console, JSON file, or both.

use meshwave_core::{EventSink, NodeEvent};
use tracing::{debug, info, trace, warn};

/// Target used for every node event
pub const EVENT_TARGET: &str = "meshwave::events";

/// Event sink that forwards to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    /// Create the sink
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for TracingEventSink {
    fn record(&self, event: NodeEvent) {
        match &event {
            NodeEvent::MessageReceived { node, kind, .. } => {
                trace!(target: EVENT_TARGET, node = node.as_u32(), %kind, "received");
            }
            NodeEvent::MessageSent { node, to, kind, .. } => {
                debug!(target: EVENT_TARGET, node = node.as_u32(), %to, %kind, "sent");
            }
            NodeEvent::MessageDropped {
                node, kind, reason, ..
            } => {
                debug!(
                    target: EVENT_TARGET,
                    node = node.as_u32(),
                    kind = ?kind,
                    %reason,
                    "dropped"
                );
            }
            NodeEvent::SendFailed {
                node,
                to,
                kind,
                error,
                ..
            } => {
                warn!(
                    target: EVENT_TARGET,
                    node = node.as_u32(),
                    %to,
                    %kind,
                    %error,
                    "send failed"
                );
            }
            NodeEvent::ProtocolViolation { node, detail, .. } => {
                warn!(target: EVENT_TARGET, node = node.as_u32(), %detail, "protocol violation");
            }
            NodeEvent::TreeCompleted {
                node,
                parent,
                children,
                ..
            } => {
                info!(
                    target: EVENT_TARGET,
                    node = node.as_u32(),
                    parent = ?parent.map(|p| p.as_u32()),
                    children = ?children.iter().map(|c| c.as_u32()).collect::<Vec<_>>(),
                    "tree complete"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshwave_core::{DropReason, MessageKind, NodeId};
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_events_become_log_lines() {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let sink = TracingEventSink::new();
            sink.record(NodeEvent::dropped(
                NodeId(3),
                Some(MessageKind::Query),
                DropReason::TtlExhausted,
            ));
            sink.record(NodeEvent::tree_completed(
                NodeId(1),
                None,
                vec![NodeId(2)],
            ));
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("dropped"));
        assert!(output.contains("TTL exhausted"));
        assert!(output.contains("tree complete"));
        assert!(output.contains("node=1"));
    }
}
