//! Error types for the document store.

use crate::types::RecordHandle;
use std::time::Duration;
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("No record matched the query")]
    NotFound,

    #[error("Write failed: {0}")]
    WriteFailed(#[source] ChannelError),

    #[error("Throttled by transport, retry after {retry_after:?}")]
    Throttled { retry_after: Duration },

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Map a transport failure raised by a mutation (send/edit/delete).
    pub fn from_write(err: ChannelError) -> Self {
        match err {
            ChannelError::Throttled { retry_after } => StoreError::Throttled { retry_after },
            ChannelError::MessageNotFound(_) => StoreError::NotFound,
            other => StoreError::WriteFailed(other),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Input or stored data that cannot become a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Document too large: {size} characters (limit {limit})")]
    DocumentTooLarge { size: usize, limit: usize },

    #[error("Expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Malformed record body: {0}")]
    MalformedRecord(String),
}

/// Failures reported by a [`MessageChannel`](crate::channel::MessageChannel).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Throttled, retry after {retry_after:?}")]
    Throttled { retry_after: Duration },

    #[error("Message not found: {0}")]
    MessageNotFound(RecordHandle),

    #[error("Rejected by transport: {0}")]
    Rejected(String),

    #[error("Transport disconnected: {0}")]
    Disconnected(String),

    #[error("Transport timed out")]
    Timeout,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
