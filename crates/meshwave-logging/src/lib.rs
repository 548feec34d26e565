//! Structured logging for Meshwave
//!
//! # Features
//!
//! - **Console Output**: Human-readable or JSON lines
//! - **File Output**: JSON lines via tracing-appender, optionally rotated
//! - **Node Spans**: Every line a node logs carries its id and address
//! - **Event Sink**: [`TracingEventSink`] writes node events as tracing events
//!
//! # Quick Start
//!
//! ```ignore
//! use meshwave_logging::{LogConfig, SubscriberBuilder};
//!
//! let _guard = SubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod sink;
pub mod subscriber;

pub use config::{ConsoleConfig, FileConfig, LogConfig, RotationStrategy};
pub use context::{client_span, node_span};
pub use error::LoggingError;
pub use sink::{EVENT_TARGET, TracingEventSink};
pub use subscriber::{SubscriberBuilder, file_writer, init_development, init_testing};
pub use tracing_appender::non_blocking::WorkerGuard;
