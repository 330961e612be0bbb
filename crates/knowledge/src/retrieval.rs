//! Ranker contract and the retrieval coordinator.
//!
//! The coordinator runs the configured ranker and, when that ranker reports
//! `BackendUnavailable`, retries exactly once with lexical ranking. Any other
//! error propagates. The returned provider tag always names the strategy
//! that produced the matches.

use crate::corpus::{AirportCorpus, CorpusStore};
use crate::types::{sort_matches, Query, RankStrategy, Retrieval, ScoredMatch};
use skylens_core::{AppError, AppResult};
use std::sync::Arc;

/// Provider tag of lexical ranking.
pub const PROVIDER_LOCAL: &str = "local";

/// Provider tag when a better strategy failed and a cheaper one answered.
pub const PROVIDER_LOCAL_FALLBACK: &str = "local-fallback";

/// Provider tag of the hosted Azure OpenAI backends.
pub const PROVIDER_AZURE: &str = "azure";

/// Tag callers see for a backend: hosted Azure is `azure`, every backend
/// running on this side of the network (trigram, Ollama, test doubles) is
/// `local`.
pub fn provider_tag(backend_name: &str) -> &'static str {
    if backend_name.eq_ignore_ascii_case(PROVIDER_AZURE) {
        PROVIDER_AZURE
    } else {
        PROVIDER_LOCAL
    }
}

/// A ranking strategy over one airport's notices.
#[async_trait::async_trait]
pub trait Ranker: Send + Sync + std::fmt::Debug {
    fn strategy(&self) -> RankStrategy;

    /// Tag reported to callers when this ranker answers.
    fn provider_tag(&self) -> &str;

    /// Rank every relevant record, best first, ties by ascending id.
    async fn rank(&self, query: &Query, corpus: &AirportCorpus) -> AppResult<Vec<ScoredMatch>>;
}

/// TF-IDF ranking over the precomputed lexical index.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalRanker;

impl LexicalRanker {
    /// Synchronous ranking; lexical scoring never waits on anything.
    pub fn rank_sync(&self, query: &Query, corpus: &AirportCorpus) -> Vec<ScoredMatch> {
        let mut matches: Vec<ScoredMatch> = corpus
            .lexical
            .score(&query.text)
            .into_iter()
            .filter_map(|(position, score)| {
                corpus.records.get(position).map(|record| ScoredMatch {
                    record: Arc::clone(record),
                    score,
                    strategy: RankStrategy::Lexical,
                })
            })
            .collect();

        sort_matches(&mut matches);
        matches
    }
}

#[async_trait::async_trait]
impl Ranker for LexicalRanker {
    fn strategy(&self) -> RankStrategy {
        RankStrategy::Lexical
    }

    fn provider_tag(&self) -> &str {
        PROVIDER_LOCAL
    }

    async fn rank(&self, query: &Query, corpus: &AirportCorpus) -> AppResult<Vec<ScoredMatch>> {
        Ok(self.rank_sync(query, corpus))
    }
}

/// Selects a ranker, truncates to top-K and applies the lexical fallback.
#[derive(Debug, Clone)]
pub struct RetrievalCoordinator {
    corpus: Arc<CorpusStore>,
    primary: Arc<dyn Ranker>,
    fallback: LexicalRanker,
}

impl RetrievalCoordinator {
    pub fn new(corpus: Arc<CorpusStore>, primary: Arc<dyn Ranker>) -> Self {
        Self {
            corpus,
            primary,
            fallback: LexicalRanker,
        }
    }

    /// Coordinator that only ranks lexically.
    pub fn lexical(corpus: Arc<CorpusStore>) -> Self {
        Self::new(corpus, Arc::new(LexicalRanker))
    }

    /// Tag of the configured primary strategy.
    pub fn provider_tag(&self) -> &str {
        self.primary.provider_tag()
    }

    /// Retrieve at most `query.k` matches for the query's airport.
    ///
    /// An airport without curated data yields an empty result, not an error.
    pub async fn retrieve(&self, query: &Query) -> AppResult<Retrieval> {
        let corpus = match self.corpus.load(&query.airport) {
            Ok(corpus) => corpus,
            Err(AppError::CorpusUnavailable { airport }) => {
                tracing::debug!(airport = %airport, "No curated notices for airport");
                return Ok(Retrieval::empty(self.primary.provider_tag()));
            }
            Err(e) => return Err(e),
        };

        let (mut matches, provider, fell_back) = match self.primary.rank(query, &corpus).await {
            Ok(matches) => (matches, self.primary.provider_tag().to_string(), false),
            Err(e)
                if e.is_backend_unavailable()
                    && self.primary.strategy() != RankStrategy::Lexical =>
            {
                tracing::warn!(
                    airport = %query.airport,
                    provider = %self.primary.provider_tag(),
                    "Vector ranking unavailable, falling back to lexical: {}",
                    e
                );
                let matches = self.fallback.rank_sync(query, &corpus);
                (matches, PROVIDER_LOCAL_FALLBACK.to_string(), true)
            }
            Err(e) => return Err(e),
        };

        matches.truncate(query.k);

        Ok(Retrieval {
            matches,
            provider,
            fell_back,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NoticeRecord;

    fn store() -> Arc<CorpusStore> {
        Arc::new(
            CorpusStore::from_records(vec![
                NoticeRecord::new("EGLL-3", "EGLL", "Taxiway closed"),
                NoticeRecord::new("EGLL-1", "EGLL", "Runway closed"),
                NoticeRecord::new("EGLL-2", "EGLL", "Crane near threshold"),
            ])
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_lexical_retrieval_truncates() {
        let coordinator = RetrievalCoordinator::lexical(store());
        let query = Query::new("closed", Some("EGLL"), Some(1)).unwrap();

        let retrieval = coordinator.retrieve(&query).await.unwrap();
        assert_eq!(retrieval.provider, PROVIDER_LOCAL);
        assert!(!retrieval.fell_back);
        assert_eq!(retrieval.matches.len(), 1);
        // Equal scores: ascending id wins
        assert_eq!(retrieval.matches[0].id(), "EGLL-1");
    }

    #[test]
    fn test_backend_names_map_to_public_tags() {
        assert_eq!(provider_tag("azure"), PROVIDER_AZURE);
        assert_eq!(provider_tag("Azure"), PROVIDER_AZURE);
        assert_eq!(provider_tag("trigram"), PROVIDER_LOCAL);
        assert_eq!(provider_tag("ollama"), PROVIDER_LOCAL);
        assert_eq!(provider_tag("mock"), PROVIDER_LOCAL);
    }

    #[tokio::test]
    async fn test_unknown_airport_is_empty() {
        let coordinator = RetrievalCoordinator::lexical(store());
        let query = Query::new("closed", Some("ZZZZ"), None).unwrap();

        let retrieval = coordinator.retrieve(&query).await.unwrap();
        assert!(retrieval.matches.is_empty());
        assert_eq!(retrieval.provider, PROVIDER_LOCAL);
    }
}
