//! Trigram embedding provider using character-trigram hashing.

use crate::embeddings::provider::EmbeddingProvider;
use crate::lexical::tokenize;
use skylens_core::AppResult;
use std::collections::BTreeMap;

/// Trigram-based embedding provider for local, offline operation.
///
/// Generates deterministic embeddings from the lexical tokens of a text
/// (so `RWY` and `runway` land on the same dimensions) by hashing each
/// token's character trigrams plus the whole token. Not semantically
/// accurate like a neural model, but consistent and content-dependent.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    /// Create a new trigram provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

/// Compute the trigram embedding of `text` with `dimensions` components.
///
/// Empty or stop-word-only text yields the zero vector.
pub fn trigram_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let mut embedding = vec![0.0; dimensions];
    if dimensions == 0 {
        return embedding;
    }

    let mut word_freq: BTreeMap<String, u32> = BTreeMap::new();
    for token in tokenize(text) {
        *word_freq.entry(token).or_insert(0) += 1;
    }

    for (word, freq) in &word_freq {
        let chars: Vec<char> = word.chars().collect();
        for window in chars.windows(3) {
            let trigram_hash = window.iter().fold(0u64, |acc, c| {
                acc.wrapping_mul(37).wrapping_add(*c as u64)
            });
            let dim_idx = (trigram_hash as usize) % dimensions;
            embedding[dim_idx] += (*freq as f32).sqrt();
        }

        let word_hash = word
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        embedding[(word_hash as usize) % dimensions] += *freq as f32;
    }

    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut embedding {
            *v /= norm;
        }
    }

    embedding
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| trigram_embedding(text, self.dimensions))
            .collect())
    }
}
