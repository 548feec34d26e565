//! # Meshwave Transport
//!
//! Transport layer for Meshwave nodes.
//!
//! ## Features
//!
//! - Length-prefixed postcard framing of [`WireMessage`](meshwave_core::WireMessage)
//! - [`TcpTransport`]: one short-lived TCP connection per message
//! - [`Dispatcher`]: fire-and-forget execution of outbound sends under a
//!   [`SendPolicy`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use meshwave_transport::{Dispatcher, SendPolicy, TcpTransport};
//!
//! let dispatcher = Dispatcher::new(
//!     node_id,
//!     Arc::new(TcpTransport::new()),
//!     sink,
//!     SendPolicy::default().with_max_in_flight(64),
//! );
//! dispatcher.dispatch(outbound);
//! ```

pub mod codec;
pub mod dispatcher;
pub mod tcp;

// Re-export main types
pub use codec::{FramingError, MAX_MESSAGE_SIZE, decode, encode, read_message, write_message};
pub use dispatcher::{Dispatcher, FailurePolicy, SendPolicy, SpawnPolicy};
pub use tcp::{TcpTransport, receive_one};
