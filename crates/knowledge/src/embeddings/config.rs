//! Embedding configuration resolved from the application config.

use serde::{Deserialize, Serialize};
use skylens_core::AppConfig;
use std::time::Duration;

/// Embedding configuration for the vector ranker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram", "ollama", "azure", "mock"
    pub provider: String,

    /// Model identifier (provider-specific; the deployment name for Azure)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Maximum batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Base URL of the embedding backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// API key for backends that need one
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// API version for Azure OpenAI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Per-call HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_batch_size() -> usize {
    16
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            batch_size: default_batch_size(),
            endpoint: None,
            api_key: None,
            api_version: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// Resolve the embedding settings for the configured RAG provider.
    ///
    /// Returns `None` for the `local` provider, which ranks lexically and
    /// never embeds.
    pub fn from_app_config(config: &AppConfig) -> Option<Self> {
        let rag = &config.rag;
        let base = Self {
            dimensions: rag.dimensions(),
            timeout_secs: rag.embed_timeout_secs,
            ..Self::default()
        };

        match rag.provider.as_str() {
            "local" => None,
            "azure" => Some(Self {
                provider: "azure".to_string(),
                model: config.azure.deployment_embed.clone(),
                endpoint: config.azure.endpoint.clone(),
                api_key: config.azure.api_key.clone(),
                api_version: Some(config.azure.api_version.clone()),
                ..base
            }),
            "ollama" => Some(Self {
                provider: "ollama".to_string(),
                model: config.ollama.embedding_model.clone(),
                endpoint: Some(config.ollama.endpoint.clone()),
                ..base
            }),
            other => Some(Self {
                provider: other.to_string(),
                ..base
            }),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
