//! The NOTAM question-answering service.
//!
//! Wires the corpus store, retrieval coordinator, answer composer and result
//! cache together. Built once at startup and shared by request handlers.

use crate::cache::{CacheKey, CacheStats, ResultCache};
use crate::config::ServiceSettings;
use crate::corpus::{CorpusEmbedder, CorpusStats, CorpusStore, RefreshOutcome};
use crate::embeddings::create_provider;
use crate::rag::{Answer, AnswerComposer};
use crate::retrieval::RetrievalCoordinator;
use crate::types::Query;
use crate::vector::VectorRanker;
use skylens_core::{AppConfig, AppResult};
use skylens_llm::create_generation_backend;
use skylens_prompt::{load_prompt, NOTAM_ANSWER_PROMPT_ID};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub struct NotamService {
    corpus: Arc<CorpusStore>,
    coordinator: RetrievalCoordinator,
    composer: AnswerComposer,
    cache: ResultCache,
}

impl NotamService {
    /// Build the service from configuration.
    ///
    /// Loads the corpus (precomputing embeddings when a vector provider is
    /// configured), selects the ranker and the generation backend.
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        let settings = ServiceSettings::from_app_config(config);

        let embedder = match &settings.embedding {
            Some(embedding) => Some((create_provider(embedding)?, embedding.batch_size)),
            None => None,
        };

        let corpus_embedder = embedder.as_ref().map(|(provider, batch_size)| CorpusEmbedder {
            provider: Arc::clone(provider),
            batch_size: *batch_size,
            timeout: settings.embed_timeout,
        });
        let corpus = Arc::new(CorpusStore::open(settings.corpus_source.clone(), corpus_embedder).await?);

        let coordinator = match embedder {
            Some((provider, _)) => {
                let ranker = VectorRanker::new(provider, settings.embed_timeout)
                    .with_min_score(settings.min_vector_score);
                RetrievalCoordinator::new(Arc::clone(&corpus), Arc::new(ranker))
            }
            None => RetrievalCoordinator::lexical(Arc::clone(&corpus)),
        };

        let composer = match create_generation_backend(config)? {
            Some(backend) => {
                let prompt = load_prompt(&settings.skylens_dir, NOTAM_ANSWER_PROMPT_ID)?;
                AnswerComposer::generative(backend, prompt, settings.generate_timeout)
            }
            None => AnswerComposer::extractive(),
        };

        let cache = ResultCache::new(settings.cache_ttl, settings.cache_max_entries);

        tracing::info!(
            retrieval = %coordinator.provider_tag(),
            embedder = %settings
                .embedding
                .as_ref()
                .map(|e| e.provider.as_str())
                .unwrap_or("none"),
            generation = %composer.generator_name().unwrap_or("none"),
            cache_ttl_secs = settings.cache_ttl.as_secs(),
            "NOTAM service ready"
        );

        Ok(Self::new(corpus, coordinator, composer, cache))
    }

    pub fn new(
        corpus: Arc<CorpusStore>,
        coordinator: RetrievalCoordinator,
        composer: AnswerComposer,
        cache: ResultCache,
    ) -> Self {
        Self {
            corpus,
            coordinator,
            composer,
            cache,
        }
    }

    /// Answer a validated query, serving repeated questions from the cache.
    pub async fn answer(&self, query: Query) -> AppResult<Answer> {
        let key = CacheKey::from_query(&query);
        let answer = self
            .cache
            .get_or_compute(key, || async {
                let retrieval = self.coordinator.retrieve(&query).await?;
                Ok(self.composer.compose(&query, &retrieval).await)
            })
            .await?;

        tracing::info!(
            airport = %query.airport,
            k = query.k,
            provider = %answer.provider,
            matches = answer.matches.len(),
            "Answered NOTAM question"
        );
        Ok(answer)
    }

    /// Validate raw request parameters and answer them.
    pub async fn ask(&self, question: &str, airport: Option<&str>, k: Option<usize>) -> AppResult<Answer> {
        self.answer(Query::new(question, airport, k)?).await
    }

    /// Re-read the corpus source; a changed corpus empties the answer cache.
    pub async fn refresh_corpus(&self) -> AppResult<RefreshOutcome> {
        let outcome = self.corpus.refresh().await?;
        if matches!(outcome, RefreshOutcome::Updated { .. }) {
            self.cache.invalidate_all();
        }
        Ok(outcome)
    }

    pub fn corpus(&self) -> &Arc<CorpusStore> {
        &self.corpus
    }

    pub fn corpus_stats(&self) -> CorpusStats {
        self.corpus.snapshot().stats()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Tag of the configured retrieval strategy.
    pub fn provider_tag(&self) -> &str {
        self.coordinator.provider_tag()
    }

    /// Refresh the corpus every `every` until the returned handle is aborted.
    pub fn spawn_refresh_task(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick completes immediately; the corpus is already fresh.
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = service.refresh_corpus().await {
                    tracing::warn!("Corpus refresh failed, keeping current snapshot: {}", e);
                }
            }
        })
    }
}
