//! Outbound send dispatch
//!
//! The protocols decide what to send; the [`Dispatcher`] decides how. Each
//! send runs on its own task so a slow or dead neighbor never holds up the
//! handler that issued it, or any other send.
//!
//! ## Policies
//!
//! - [`SpawnPolicy::Unbounded`]: one task per send, started immediately
//! - [`SpawnPolicy::Bounded`]: tasks wait on a semaphore before connecting
//! - [`FailurePolicy::Report`]: failures become `SendFailed` events
//! - [`FailurePolicy::Swallow`]: failures are only traced

use std::sync::Arc;

use meshwave_core::{EventSink, NodeEvent, NodeId, Outbound, Transport};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

/// How send tasks are started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnPolicy {
    /// Every send starts at once
    Unbounded,
    /// At most `max_in_flight` sends run concurrently; the rest queue
    Bounded { max_in_flight: usize },
}

/// What happens to a failed send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Record a `SendFailed` event on the sink
    Report,
    /// Trace-level log only
    Swallow,
}

/// Fire-and-forget send policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendPolicy {
    pub spawn: SpawnPolicy,
    pub failures: FailurePolicy,
}

impl Default for SendPolicy {
    fn default() -> Self {
        Self {
            spawn: SpawnPolicy::Unbounded,
            failures: FailurePolicy::Report,
        }
    }
}

impl SendPolicy {
    /// Cap concurrent sends
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.spawn = SpawnPolicy::Bounded { max_in_flight };
        self
    }

    /// Do not report failed sends as events
    pub fn swallow_failures(mut self) -> Self {
        self.failures = FailurePolicy::Swallow;
        self
    }
}

/// Executes outbound sends for one node
pub struct Dispatcher {
    node: NodeId,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn EventSink>,
    policy: SendPolicy,
    permits: Option<Arc<Semaphore>>,
    tracker: TaskTracker,
}

impl Dispatcher {
    /// Create a dispatcher for `node`
    pub fn new(
        node: NodeId,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn EventSink>,
        policy: SendPolicy,
    ) -> Self {
        let permits = match policy.spawn {
            SpawnPolicy::Unbounded => None,
            // A zero limit would park every send forever
            SpawnPolicy::Bounded { max_in_flight } => {
                Some(Arc::new(Semaphore::new(max_in_flight.max(1))))
            }
        };

        Self {
            node,
            transport,
            sink,
            policy,
            permits,
            tracker: TaskTracker::new(),
        }
    }

    /// The policy in effect
    pub fn policy(&self) -> SendPolicy {
        self.policy
    }

    /// Number of sends not yet finished
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Issue every send in `outbound`
    ///
    /// Must be called from within a Tokio runtime. Returns immediately.
    pub fn dispatch(&self, outbound: impl IntoIterator<Item = Outbound>) {
        for send in outbound {
            self.send(send);
        }
    }

    /// Issue one send
    pub fn send(&self, outbound: Outbound) {
        let Outbound { target, message } = outbound;
        let kind = message.kind();

        self.sink.record(NodeEvent::sent(self.node, target, kind));

        let node = self.node;
        let transport = Arc::clone(&self.transport);
        let sink = Arc::clone(&self.sink);
        let failures = self.policy.failures;
        let permits = self.permits.clone();

        self.tracker.spawn(async move {
            let _permit = match permits {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    // Semaphore is never closed while the dispatcher lives
                    Err(_) => return,
                },
                None => None,
            };

            match transport.send(target, message).await {
                Ok(()) => trace!(%node, %target, %kind, "delivered"),
                Err(e) => match failures {
                    FailurePolicy::Report => {
                        debug!(%node, %target, %kind, error = %e, "send failed");
                        sink.record(NodeEvent::send_failed(node, target, kind, &e));
                    }
                    FailurePolicy::Swallow => {
                        trace!(%node, %target, %kind, error = %e, "send failed");
                    }
                },
            }
        });
    }

    /// Wait until every send issued so far has finished
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("node", &self.node)
            .field("policy", &self.policy)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
