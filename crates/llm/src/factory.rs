//! LLM provider factory.
//!
//! This module creates generation clients from application configuration,
//! resolving the provider name and its credentials.

use crate::client::LlmClient;
use crate::providers::{AzureOpenAiClient, OllamaClient};
use crate::types::ProviderType;
use skylens_core::{AppConfig, AppError, AppResult};
use std::sync::Arc;

/// A generation client paired with the model name its requests carry.
#[derive(Clone)]
pub struct GenerationBackend {
    pub client: Arc<dyn LlmClient>,
    pub model: String,
}

/// Create an LLM client for `provider`.
///
/// # Errors
/// Returns error if:
/// - Provider is unknown
/// - Azure OpenAI credentials are missing
pub fn create_client(provider: &str, config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown generation provider: {}", provider)))?;

    match provider_type {
        ProviderType::Ollama => Ok(Arc::new(OllamaClient::with_base_url(
            config.ollama.endpoint.clone(),
        ))),
        ProviderType::Azure => {
            let (endpoint, api_key) = match (&config.azure.endpoint, &config.azure.api_key) {
                (Some(endpoint), Some(api_key)) => (endpoint, api_key),
                _ => {
                    return Err(AppError::Config(
                        "Azure OpenAI provider requires AOAI_ENDPOINT and AOAI_API_KEY"
                            .to_string(),
                    ))
                }
            };
            Ok(Arc::new(AzureOpenAiClient::new(
                endpoint.clone(),
                api_key.clone(),
                config.azure.api_version.clone(),
                config.azure.deployment_chat.clone(),
            )))
        }
    }
}

/// Build the configured generation backend, if any.
///
/// Returns `Ok(None)` when answers should be extractive only.
pub fn create_generation_backend(config: &AppConfig) -> AppResult<Option<GenerationBackend>> {
    let Some(provider) = config.rag.generation_backend() else {
        return Ok(None);
    };

    let client = create_client(provider, config)?;
    let model = match ProviderType::parse(provider) {
        Some(ProviderType::Azure) => config.azure.deployment_chat.clone(),
        _ => config.ollama.model.clone(),
    };

    tracing::info!(provider = %provider, model = %model, "Generation backend configured");
    Ok(Some(GenerationBackend { client, model }))
}
