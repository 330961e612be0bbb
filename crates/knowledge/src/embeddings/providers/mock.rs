//! Scriptable embedding provider for tests and development.

use crate::embeddings::provider::EmbeddingProvider;
use crate::embeddings::providers::trigram::trigram_embedding;
use skylens_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Mock provider for testing.
///
/// By default it embeds like the trigram provider. Fixed vectors can be
/// registered per text, and the provider can be told to fail or stall so
/// fallback and timeout paths are testable without a network.
#[derive(Debug)]
pub struct MockProvider {
    dimensions: usize,
    fixed: HashMap<String, Vec<f32>>,
    unavailable: AtomicBool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Create a new mock provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            fixed: HashMap::new(),
            unavailable: AtomicBool::new(false),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// A provider whose every call fails with `BackendUnavailable`.
    pub fn unavailable(dimensions: usize) -> Self {
        Self {
            unavailable: AtomicBool::new(true),
            ..Self::new(dimensions)
        }
    }

    /// Return `vector` whenever `text` is embedded.
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.fixed.insert(text.into(), vector);
        self
    }

    /// Sleep before answering each batch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Bring the backend down or back up.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of `embed_batch` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::BackendUnavailable(
                "mock embedding backend is down".to_string(),
            ));
        }

        Ok(texts
            .iter()
            .map(|text| {
                self.fixed
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| trigram_embedding(text, self.dimensions))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_defaults_to_trigram() {
        let provider = MockProvider::new(64);
        let embedding = provider.embed("runway closed").await.unwrap();
        assert_eq!(embedding, trigram_embedding("runway closed", 64));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_provider_fixed_vector() {
        let provider = MockProvider::new(3).with_vector("q", vec![1.0, 0.0, 0.0]);
        let embeddings = provider
            .embed_batch(&["q".to_string(), "other".to_string()])
            .await
            .unwrap();
        assert_eq!(embeddings[0], vec![1.0, 0.0, 0.0]);
        assert_eq!(embeddings[1].len(), 3);
    }

    #[tokio::test]
    async fn test_mock_provider_unavailable() {
        let provider = MockProvider::unavailable(3);
        let err = provider.embed("q").await.unwrap_err();
        assert!(err.is_backend_unavailable());
        assert_eq!(provider.calls(), 1);

        provider.set_available(true);
        assert_eq!(provider.embed("q").await.unwrap().len(), 3);
    }
}
