//! OpenAI-compatible embedding client.

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

use claimsight_types::EmbeddingSettings;

use crate::{EmbeddingProvider, ProviderError};

/// Configuration for the API embedding client.
#[derive(Debug, Clone)]
pub struct EmbeddingProviderConfig {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,

    /// Embedding model to use (e.g., "text-embedding-3-small")
    pub model: String,

    /// API key
    pub api_key: SecretString,

    /// Request timeout
    pub timeout: Duration,

    /// Maximum retries on failure
    pub max_retries: u32,
}

impl EmbeddingProviderConfig {
    /// Create a config with defaults for timeout and retries.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: SecretString::from(api_key.into()),
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }

    /// Build a config from settings.
    ///
    /// Returns `None` when no API key is configured; an unconfigured
    /// provider is a no-op for the pipeline, not an error.
    pub fn from_settings(settings: &EmbeddingSettings) -> Option<Self> {
        settings
            .api_key
            .as_ref()
            .map(|key| Self::new(key.clone(), settings.base_url.clone(), settings.model.clone()))
    }
}

/// Embedding provider backed by an OpenAI-compatible `/embeddings` endpoint.
pub struct ApiEmbeddingProvider {
    client: Client,
    config: EmbeddingProviderConfig,
}

impl ApiEmbeddingProvider {
    /// Create a new API embedding provider.
    pub fn new(config: EmbeddingProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::ConfigError(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Call the API with retry logic.
    async fn call_api(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, inputs = inputs.len(), "Calling embedding API");

            match self.make_request(inputs).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempts >= self.config.max_retries {
                        error!(error = %e, "Max retries exceeded");
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "Embedding call failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(error = %e, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Make a single embeddings request.
    async fn make_request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        #[derive(Serialize)]
        struct EmbeddingsRequest<'a> {
            model: &'a str,
            input: &'a [String],
        }

        #[derive(Deserialize)]
        struct EmbeddingsResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
        }

        let request = EmbeddingsRequest {
            model: &self.config.model,
            input: inputs,
        };

        let url = format!("{}/embeddings", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::ApiError(e.to_string()))?;

        if response.status() == 429 {
            return Err(ProviderError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        let response_body: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(response_body
            .data
            .into_iter()
            .map(|d| d.embedding)
            .collect())
    }
}

#[async_trait]
impl EmbeddingProvider for ApiEmbeddingProvider {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        self.call_api(inputs).await
    }
}
