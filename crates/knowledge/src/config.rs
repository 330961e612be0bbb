//! Service settings resolved once from the application config.

use crate::corpus::CorpusSource;
use crate::embeddings::EmbeddingConfig;
use skylens_core::AppConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the NOTAM service needs from `AppConfig`, in typed form.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub corpus_source: CorpusSource,
    pub corpus_refresh: Option<Duration>,
    /// `None` means lexical ranking only
    pub embedding: Option<EmbeddingConfig>,
    pub min_vector_score: f32,
    pub embed_timeout: Duration,
    pub generate_timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    /// Directory searched for prompt overrides
    pub skylens_dir: PathBuf,
}

impl ServiceSettings {
    pub fn from_app_config(config: &AppConfig) -> Self {
        let rag = &config.rag;
        Self {
            corpus_source: CorpusSource::from_path(rag.corpus_path.as_deref()),
            corpus_refresh: rag
                .corpus_refresh_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            embedding: EmbeddingConfig::from_app_config(config),
            min_vector_score: rag.min_vector_score,
            embed_timeout: Duration::from_secs(rag.embed_timeout_secs),
            generate_timeout: Duration::from_secs(rag.generate_timeout_secs),
            cache_ttl: Duration::from_secs(rag.cache_ttl_secs),
            cache_max_entries: rag.cache_max_entries,
            skylens_dir: config.skylens_dir(),
        }
    }
}
