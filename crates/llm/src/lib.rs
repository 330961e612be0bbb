//! LLM integration crate for Skylens.
//!
//! This crate provides a provider-agnostic abstraction for the generation
//! backend used by the NOTAM answer composer.
//!
//! # Providers
//! - **Azure OpenAI**: chat completions against a deployment
//! - **Ollama**: local LLM runtime
//!
//! # Example
//! ```no_run
//! use skylens_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Is runway 09L open?", "llama3.2").with_temperature(0.0);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{create_client, create_generation_backend, GenerationBackend};
pub use providers::{AzureOpenAiClient, OllamaClient};
pub use types::ProviderType;
