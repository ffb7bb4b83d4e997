//! OpenAI-compatible chat-completion client.

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

use claimsight_types::ChatSettings;

use crate::{ChatModel, ProviderError};

/// Configuration for the API chat client.
#[derive(Debug, Clone)]
pub struct ChatModelConfig {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,

    /// Completion model to use (e.g., "gpt-4o-mini")
    pub model: String,

    /// API key
    pub api_key: SecretString,

    /// Sampling temperature
    pub temperature: f32,

    /// Request timeout
    pub timeout: Duration,

    /// Maximum retries on failure
    pub max_retries: u32,
}

impl ChatModelConfig {
    /// Create a config with defaults for timeout and retries.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: SecretString::from(api_key.into()),
            temperature: 0.2,
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }

    /// Build a config from settings; `None` when no API key is configured.
    pub fn from_settings(settings: &ChatSettings) -> Option<Self> {
        settings.api_key.as_ref().map(|key| {
            let mut config =
                Self::new(key.clone(), settings.base_url.clone(), settings.model.clone());
            config.temperature = settings.temperature;
            config
        })
    }
}

/// Chat model backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct ApiChatModel {
    client: Client,
    config: ChatModelConfig,
}

impl ApiChatModel {
    /// Create a new API chat model.
    pub fn new(config: ChatModelConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::ConfigError(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Call the API with retry logic.
    async fn call_api(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(120)),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, "Calling chat completion API");

            match self.make_request(system, user).await {
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
                                "Chat call failed, retrying"
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

    /// Make a single chat-completions request.
    async fn make_request(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: Vec<ChatMessage<'a>>,
            temperature: f32,
        }

        #[derive(Serialize)]
        struct ChatMessage<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<ChatChoice>,
        }

        #[derive(Deserialize)]
        struct ChatChoice {
            message: ChatMessageResponse,
        }

        #[derive(Deserialize)]
        struct ChatMessageResponse {
            content: String,
        }

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.config.temperature,
        };

        let url = format!("{}/chat/completions", self.config.base_url);

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

        let response_body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        response_body
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| ProviderError::ParseError("No choices in response".to_string()))
    }
}

#[async_trait]
impl ChatModel for ApiChatModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        self.call_api(system, user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimsight_types::Settings;

    #[test]
    fn config_from_settings_carries_temperature() {
        let mut settings = Settings::default().chat;
        assert!(ChatModelConfig::from_settings(&settings).is_none());

        settings.api_key = Some("sk-test".to_string());
        settings.temperature = 0.7;
        let config = ChatModelConfig::from_settings(&settings).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
    }
}
