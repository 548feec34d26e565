//! Logging setup errors

use thiserror::Error;

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Failed to create log appender: {0}")]
    Appender(String),

    #[error("Failed to install subscriber: {0}")]
    Init(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
