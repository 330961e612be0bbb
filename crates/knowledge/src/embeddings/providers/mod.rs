//! Embedding provider implementations.

pub mod azure;
pub mod mock;
pub mod ollama;
pub mod trigram;

pub use azure::AzureEmbeddingProvider;
pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use trigram::TrigramProvider;
