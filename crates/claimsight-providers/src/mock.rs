//! Scripted providers for tests.
//!
//! The pipeline crates exercise their batch and failure handling against
//! these instead of live endpoints.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{ChatModel, EmbeddingProvider, ProviderError};

/// Embedding provider returning deterministic vectors.
///
/// Vectors are derived from the input text so distinct claims land in
/// distinct regions of the space. `fail_after_batches` makes the provider
/// error on the Nth call and every call after it, which is how the
/// partial-run scenarios are scripted.
pub struct MockEmbeddingProvider {
    dimension: usize,
    fail_after_batches: Option<usize>,
    calls: Mutex<usize>,
}

impl MockEmbeddingProvider {
    /// Create a provider that always succeeds.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail_after_batches: None,
            calls: Mutex::new(0),
        }
    }

    /// Create a provider that succeeds for `batches` calls and then fails.
    pub fn failing_after(dimension: usize, batches: usize) -> Self {
        Self {
            dimension,
            fail_after_batches: Some(batches),
            calls: Mutex::new(0),
        }
    }

    /// Number of batch calls made so far.
    pub fn batch_calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn vector_for(&self, input: &str) -> Vec<f32> {
        // Cheap stable hash spread over the dimensions.
        let mut hash: u64 = 1469598103934665603;
        for byte in input.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(1099511628211);
        }
        (0..self.dimension)
            .map(|i| {
                let mixed = hash.rotate_left((i % 63) as u32);
                ((mixed % 1000) as f32) / 1000.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if let Some(limit) = self.fail_after_batches {
            if *calls > limit {
                return Err(ProviderError::ApiError("simulated provider outage".to_string()));
            }
        }
        Ok(inputs.iter().map(|input| self.vector_for(input)).collect())
    }
}

/// Embedding provider that drops the last vector of every batch.
///
/// Used to verify that a count mismatch is treated as a batch failure.
pub struct ShortReplyEmbeddingProvider {
    dimension: usize,
}

impl ShortReplyEmbeddingProvider {
    /// Create a provider returning one vector too few.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for ShortReplyEmbeddingProvider {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let count = inputs.len().saturating_sub(1);
        Ok((0..count).map(|_| vec![0.0; self.dimension]).collect())
    }
}

/// Chat model that replays canned responses in order.
///
/// Records every prompt it receives; once the scripted responses run out it
/// repeats the last one.
pub struct MockChatModel {
    responses: Vec<String>,
    prompts: Mutex<Vec<(String, String)>>,
    calls: Mutex<usize>,
}

impl MockChatModel {
    /// Create a chat model that always returns `response`.
    pub fn new(response: impl Into<String>) -> Self {
        Self::with_responses(vec![response.into()])
    }

    /// Create a chat model replaying `responses` in order.
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses,
            prompts: Mutex::new(Vec::new()),
            calls: Mutex::new(0),
        }
    }

    /// Prompts received so far, as (system, user) pairs.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }

    /// Number of completion calls made so far.
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        let mut calls = self.calls.lock().unwrap();
        let index = (*calls).min(self.responses.len().saturating_sub(1));
        *calls += 1;
        Ok(self.responses[index].clone())
    }
}

/// Chat model that always fails.
pub struct FailingChatModel;

#[async_trait]
impl ChatModel for FailingChatModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
        Err(ProviderError::ApiError("simulated chat outage".to_string()))
    }
}
