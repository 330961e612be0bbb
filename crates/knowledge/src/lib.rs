//! NOTAM retrieval and grounded answering.
//!
//! Holds the curated notice corpus, ranks notices for a question (lexically or
//! by embedding similarity, with a lexical fallback), composes a cited answer
//! and caches it.

pub mod cache;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod lexical;
pub mod rag;
pub mod retrieval;
pub mod service;
pub mod types;
pub mod vector;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use cache::{
    CacheKey, CacheStats, Clock, ManualClock, ResultCache, SystemClock, DEGRADED_TTL,
};
pub use config::ServiceSettings;
pub use corpus::{CorpusSource, CorpusStats, CorpusStore, RefreshOutcome};
pub use rag::{Answer, AnswerComposer, CitationHandle};
pub use retrieval::{
    provider_tag, LexicalRanker, Ranker, RetrievalCoordinator, PROVIDER_AZURE, PROVIDER_LOCAL,
    PROVIDER_LOCAL_FALLBACK,
};
pub use service::NotamService;
pub use types::{
    NoticeRecord, Query, RankStrategy, Retrieval, ScoredMatch, DEFAULT_AIRPORT, DEFAULT_TOP_K,
    MAX_TOP_K,
};
pub use vector::VectorRanker;
