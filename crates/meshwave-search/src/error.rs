//! Search error types

use meshwave_core::RequestId;
use thiserror::Error;

/// Reasons the request table refuses an operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    /// The request id was already recorded
    #[error("Request {0} already handled")]
    AlreadySeen(RequestId),

    /// No route back for a response
    #[error("No return path for request {0}")]
    NoReturnPath(RequestId),
}

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;
