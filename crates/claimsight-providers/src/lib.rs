//! # claimsight-providers
//!
//! Remote provider adapters for ClaimSight.
//!
//! Two pluggable seams are defined here:
//! - [`EmbeddingProvider`]: turns a batch of claim sentences into one
//!   fixed-dimension vector per input, in input order.
//! - [`ChatModel`]: sends a role-tagged prompt to a chat-completion endpoint
//!   and returns the free-form response text.
//!
//! The bundled implementations target OpenAI-compatible HTTP APIs with
//! timeout and retry handling; [`mock`] provides scripted substitutes for
//! tests.

pub mod chat;
pub mod embedding;
pub mod mock;

pub use chat::{ApiChatModel, ChatModelConfig};
pub use embedding::{ApiEmbeddingProvider, EmbeddingProviderConfig};

use async_trait::async_trait;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// Pluggable text-embedding provider.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of input strings.
    ///
    /// A successful response carries exactly one vector per input, in input
    /// order; callers treat any count mismatch as a batch failure.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}

/// Pluggable chat-completion provider.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send a system and user message, returning the raw response text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError>;
}
