//! Error types for the `endee-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in retrieval pipeline operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid parameters or an index whose dimension/space type does not
    /// match what the caller declared. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A malformed chunk, vector or argument. Fatal for the affected item only.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The index service could not be reached (network failure, timeout or
    /// 5xx) after exhausting the retry budget.
    #[error("Service unavailable during {operation} after {attempts} attempt(s): {message}")]
    ServiceUnavailable {
        /// The client operation that failed, e.g. `insert`.
        operation: String,
        /// How many attempts were made.
        attempts: u32,
        /// The last failure observed.
        message: String,
    },

    /// The index service rejected a well-formed request.
    #[error("Index error on '{index}' (HTTP {status}): {message}")]
    Index {
        /// The index the request targeted.
        index: String,
        /// The HTTP status returned by the service.
        status: u16,
        /// The service's diagnostic message.
        message: String,
    },

    /// The embedding backend failed.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A document could not be read from its source.
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        /// The path that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A convenience result type for retrieval pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
