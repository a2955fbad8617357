//! Error types for the sync engine.

use crate::transport::Method;
use netsync_protocol::EntityKind;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error (connection refused, timeout, TLS).
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation could be retried.
        retryable: bool,
    },

    /// The upstream answered with an HTTP error status.
    #[error("{method} {path} failed with status {status}: {body}")]
    Status {
        /// Request method.
        method: Method,
        /// Request path (without host).
        path: String,
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The upstream answered successfully but not with JSON.
    #[error("unexpected content type {content_type:?} from {path}")]
    UnexpectedContentType {
        /// Request path (without host).
        path: String,
        /// Content type the server reported.
        content_type: String,
    },

    /// The caller asked for an HTTP method the transport does not issue.
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// The source network has no processed snapshot to query.
    #[error("no processed snapshot available for network {network_id}")]
    SnapshotUnavailable {
        /// Source network id.
        network_id: String,
    },

    /// The sink returned no body where a collection was expected.
    #[error("empty response from {path}")]
    EmptyResponse {
        /// Request path (without host).
        path: String,
    },

    /// A foreign-key name has no match in the sink.
    #[error("unresolved {field} reference {value:?} on {kind} record {record:?}")]
    UnresolvedReference {
        /// Kind of the record carrying the reference.
        kind: EntityKind,
        /// Display name of the record.
        record: String,
        /// Referencing field.
        field: &'static str,
        /// The name that could not be resolved.
        value: String,
    },

    /// Response body did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error is transient.
    ///
    /// netsync never retries on its own; this only classifies failures
    /// for reporting.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns the HTTP status if this is a status error.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
