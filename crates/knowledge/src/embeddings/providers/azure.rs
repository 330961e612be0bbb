//! Azure OpenAI embedding provider.
//!
//! `POST {endpoint}/openai/deployments/{deployment}/embeddings?api-version=...`
//! with the whole batch as `input`; results come back tagged with their
//! input index.

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use skylens_core::{AppError, AppResult};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct AzureEmbeddingProvider {
    client: Client,
    url: String,
    api_key: String,
    deployment: String,
    dimensions: usize,
}

impl AzureEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> AppResult<Self> {
        let (endpoint, api_key) = match (&config.endpoint, &config.api_key) {
            (Some(endpoint), Some(api_key)) => (endpoint, api_key),
            _ => {
                return Err(AppError::Config(
                    "Azure OpenAI embeddings require AOAI_ENDPOINT and AOAI_API_KEY".to_string(),
                ))
            }
        };

        let api_version = config
            .api_version
            .as_deref()
            .unwrap_or("2024-08-01-preview");

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!(
                "{}/openai/deployments/{}/embeddings?api-version={}",
                endpoint.trim_end_matches('/'),
                config.model,
                api_version
            ),
            api_key: api_key.clone(),
            deployment: config.model.clone(),
            dimensions: config.dimensions,
        })
    }
}

/// Put embeddings back in input order and check the count.
fn order_embeddings(mut data: Vec<EmbeddingItem>, expected: usize) -> AppResult<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(AppError::BackendUnavailable(format!(
            "Azure OpenAI returned {} embeddings for {} inputs",
            data.len(),
            expected
        )));
    }
    data.sort_by_key(|item| item.index);
    Ok(data.into_iter().map(|item| item.embedding).collect())
}

#[async_trait::async_trait]
impl EmbeddingProvider for AzureEmbeddingProvider {
    fn provider_name(&self) -> &str {
        "azure"
    }

    fn model_name(&self) -> &str {
        &self.deployment
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(batch_size = texts.len(), deployment = %self.deployment, "Requesting Azure OpenAI embeddings");

        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&EmbeddingRequest { input: texts })
            .send()
            .await
            .map_err(|e| {
                AppError::BackendUnavailable(format!("Failed to reach Azure OpenAI: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::BackendUnavailable(format!(
                "Azure OpenAI embeddings error ({}): {}",
                status, error_text
            )));
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::BackendUnavailable(format!("Failed to parse Azure OpenAI response: {}", e))
        })?;

        order_embeddings(body.data, texts.len())
    }
}
