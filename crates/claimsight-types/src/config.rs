//! Configuration loading for ClaimSight.
//!
//! Layered config: built-in defaults -> config file -> environment variables.
//! The default config file lives at ~/.config/claimsight/config.toml; every
//! value can be overridden with a CLAIMSIGHT_* environment variable.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ClaimSightError;

/// Embedding provider configuration.
///
/// An absent `api_key` means the provider is unconfigured; embedding
/// generation then becomes a no-op rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// API key (loaded from env var, not stored in config file)
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL for an OpenAI-compatible embeddings endpoint
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector dimensionality; fixed for the lifetime of the collection
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Claims per embedding request (clamped to a minimum of 1 at use)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_api_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimension() -> usize {
    1536
}

fn default_batch_size() -> usize {
    64
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_api_base_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_batch_size(),
        }
    }
}

/// Chat-completion provider configuration for cluster explanations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    /// API key (loaded from env var, not stored in config file)
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL for an OpenAI-compatible chat endpoint
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Completion model name
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum member claims sampled into one explanation prompt
    #[serde(default = "default_max_sample_claims")]
    pub max_sample_claims: usize,
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_sample_claims() -> usize {
    20
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_api_base_url(),
            model: default_chat_model(),
            temperature: default_temperature(),
            max_sample_claims: default_max_sample_claims(),
        }
    }
}

/// Vector store (Qdrant) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreSettings {
    /// Qdrant base URL
    #[serde(default = "default_vector_url")]
    pub url: String,

    /// Optional Qdrant API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Collection name shared by all writers
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Page size for full scrolls of the collection
    #[serde(default = "default_scroll_page_size")]
    pub scroll_page_size: usize,
}

fn default_vector_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection() -> String {
    "claim_embeddings".to_string()
}

fn default_scroll_page_size() -> usize {
    256
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            url: default_vector_url(),
            api_key: None,
            collection: default_collection(),
            scroll_page_size: default_scroll_page_size(),
        }
    }
}

/// Clustering pass configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringSettings {
    /// Minimum embedded claims before a clustering pass will run
    #[serde(default = "default_min_claims")]
    pub min_claims: usize,

    /// Upper bound on the cluster count k
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Fixed seed for reproducible k-means runs
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Independent k-means restarts; the lowest-inertia run wins
    #[serde(default = "default_restarts")]
    pub restarts: usize,

    /// Iteration cap per k-means run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_min_claims() -> usize {
    50
}

fn default_k() -> usize {
    10
}

fn default_seed() -> u64 {
    42
}

fn default_restarts() -> usize {
    10
}

fn default_max_iterations() -> usize {
    100
}

impl Default for ClusteringSettings {
    fn default() -> Self {
        Self {
            min_claims: default_min_claims(),
            default_k: default_k(),
            seed: default_seed(),
            restarts: default_restarts(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// Main application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingSettings,

    /// Chat provider configuration
    #[serde(default)]
    pub chat: ChatSettings,

    /// Vector store configuration
    #[serde(default)]
    pub vector_store: VectorStoreSettings,

    /// Clustering configuration
    #[serde(default)]
    pub clustering: ClusteringSettings,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            embedding: EmbeddingSettings::default(),
            chat: ChatSettings::default(),
            vector_store: VectorStoreSettings::default(),
            clustering: ClusteringSettings::default(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/claimsight/config.toml)
    /// 3. Caller-specified config file (optional)
    /// 4. Environment variables (CLAIMSIGHT_*)
    pub fn load(config_path: Option<&str>) -> Result<Self, ClaimSightError> {
        let config_dir = ProjectDirs::from("", "", "claimsight")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: CLAIMSIGHT_LOG_LEVEL, CLAIMSIGHT_EMBEDDING__API_KEY,
        // CLAIMSIGHT_VECTOR_STORE__URL, etc.
        builder = builder.add_source(
            Environment::with_prefix("CLAIMSIGHT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| ClaimSightError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| ClaimSightError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ClaimSightError> {
        if self.embedding.dimension == 0 {
            return Err(ClaimSightError::Config(
                "embedding.dimension must be > 0".to_string(),
            ));
        }
        if self.clustering.default_k < 2 {
            return Err(ClaimSightError::Config(format!(
                "clustering.default_k must be >= 2, got {}",
                self.clustering.default_k
            )));
        }
        if self.clustering.min_claims == 0 {
            return Err(ClaimSightError::Config(
                "clustering.min_claims must be > 0".to_string(),
            ));
        }
        if self.clustering.restarts == 0 || self.clustering.max_iterations == 0 {
            return Err(ClaimSightError::Config(
                "clustering.restarts and clustering.max_iterations must be > 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(ClaimSightError::Config(format!(
                "chat.temperature must be 0.0-2.0, got {}",
                self.chat.temperature
            )));
        }
        if self.vector_store.scroll_page_size == 0 {
            return Err(ClaimSightError::Config(
                "vector_store.scroll_page_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.embedding.model, "text-embedding-3-small");
        assert_eq!(settings.embedding.dimension, 1536);
        assert_eq!(settings.embedding.batch_size, 64);
        assert_eq!(settings.chat.model, "gpt-4o-mini");
        assert_eq!(settings.clustering.min_claims, 50);
        assert_eq!(settings.clustering.default_k, 10);
        assert_eq!(settings.vector_store.collection, "claim_embeddings");
    }

    #[test]
    fn unconfigured_providers_have_no_keys() {
        let settings = Settings::default();
        assert!(settings.embedding.api_key.is_none());
        assert!(settings.chat.api_key.is_none());
    }

    #[test]
    fn load_from_explicit_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[embedding]
batch_size = 8

[clustering]
default_k = 4
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.embedding.batch_size, 8);
        assert_eq!(settings.clustering.default_k, 4);
        // Untouched sections keep their defaults.
        assert_eq!(settings.vector_store.scroll_page_size, 256);
    }

    #[test]
    fn validate_rejects_degenerate_k() {
        let mut settings = Settings::default();
        settings.clustering.default_k = 1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_dimension() {
        let mut settings = Settings::default();
        settings.embedding.dimension = 0;
        assert!(settings.validate().is_err());
    }
}
