//! Embedding-similarity ranking.

use crate::corpus::AirportCorpus;
use crate::embeddings::EmbeddingProvider;
use crate::retrieval::{provider_tag, Ranker};
use crate::types::{sort_matches, Query, RankStrategy, ScoredMatch};
use skylens_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Minimum cosine similarity score for a record to be considered relevant.
/// Range: -1.0 to 1.0, where 1.0 is perfect match, 0.0 is orthogonal.
pub const MIN_RELEVANCE_SCORE: f32 = 0.20;

/// Cosine similarity of two equal-length vectors; 0.0 if either is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Ranks records by cosine similarity between query and record embeddings.
#[derive(Debug, Clone)]
pub struct VectorRanker {
    embedder: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
    min_score: f32,
}

impl VectorRanker {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        Self {
            embedder,
            timeout,
            min_score: MIN_RELEVANCE_SCORE,
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Embed the query plus every record lacking an embedding in one call.
    async fn embed_request(&self, texts: Vec<String>) -> AppResult<Vec<Vec<f32>>> {
        let expected = texts.len();
        let vectors = tokio::time::timeout(self.timeout, self.embedder.embed_batch(&texts))
            .await
            .map_err(|_| {
                AppError::BackendUnavailable(format!(
                    "Embedding request timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            })??;

        if vectors.len() != expected {
            return Err(AppError::BackendUnavailable(format!(
                "Embedding backend returned {} vectors for {} texts",
                vectors.len(),
                expected
            )));
        }
        Ok(vectors)
    }
}

#[async_trait::async_trait]
impl Ranker for VectorRanker {
    fn strategy(&self) -> RankStrategy {
        RankStrategy::Vector
    }

    fn provider_tag(&self) -> &str {
        provider_tag(self.embedder.provider_name())
    }

    async fn rank(&self, query: &Query, corpus: &AirportCorpus) -> AppResult<Vec<ScoredMatch>> {
        if corpus.is_empty() {
            return Ok(Vec::new());
        }

        let mut texts = vec![query.text.clone()];
        texts.extend(
            corpus
                .records
                .iter()
                .filter(|r| r.embedding.is_none())
                .map(|r| r.text.clone()),
        );
        let on_demand = texts.len() - 1;

        let mut vectors = self.embed_request(texts).await?.into_iter();
        let query_embedding = vectors.next().ok_or_else(|| {
            AppError::BackendUnavailable("No query embedding returned".to_string())
        })?;

        if on_demand > 0 {
            tracing::debug!(
                airport = %corpus.airport,
                records = on_demand,
                "Embedded records on demand"
            );
        }

        let mut matches = Vec::with_capacity(corpus.len());
        for record in &corpus.records {
            let score = match &record.embedding {
                Some(embedding) => similarity(&query_embedding, embedding, &record.id)?,
                None => {
                    let embedding = vectors.next().ok_or_else(|| {
                        AppError::BackendUnavailable("Missing record embedding".to_string())
                    })?;
                    similarity(&query_embedding, &embedding, &record.id)?
                }
            };

            if score >= self.min_score {
                matches.push(ScoredMatch {
                    record: Arc::clone(record),
                    score,
                    strategy: RankStrategy::Vector,
                });
            }
        }

        sort_matches(&mut matches);
        Ok(matches)
    }
}

fn similarity(query: &[f32], record: &[f32], record_id: &str) -> AppResult<f32> {
    if query.len() != record.len() {
        return Err(AppError::EmbeddingDimensionMismatch {
            record: record_id.to_string(),
            expected: query.len(),
            actual: record.len(),
        });
    }
    Ok(cosine_similarity(query, record))
}
