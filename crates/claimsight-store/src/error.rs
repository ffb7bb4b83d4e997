//! Store error types.

use thiserror::Error;

/// Errors surfaced by claim and cluster stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(String),

    /// Referenced row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A transactional batch could not be applied
    #[error("Transaction failed: {0}")]
    Transaction(String),
}
