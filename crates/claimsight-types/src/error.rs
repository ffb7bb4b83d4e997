//! Error types shared across the ClaimSight system.

use thiserror::Error;

/// Unified error type for cross-cutting ClaimSight operations.
///
/// The adapter and pipeline crates carry their own error enums; only
/// configuration loading reports through this one.
#[derive(Debug, Error)]
pub enum ClaimSightError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
