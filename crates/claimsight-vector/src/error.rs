//! Vector index error types.

use thiserror::Error;

/// Errors that can occur during vector index operations.
#[derive(Debug, Error)]
pub enum VectorIndexError {
    /// Request-level failure (network, timeout)
    #[error("Request failed: {0}")]
    Request(String),

    /// The store answered with an error status
    #[error("Vector store error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// Response body could not be decoded
    #[error("Unexpected response: {0}")]
    Response(String),

    /// Invalid adapter configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}
