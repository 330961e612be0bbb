//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skylens_core::{AppError, AppResult};
use std::sync::Arc;

/// Airport used when a request does not name one.
pub const DEFAULT_AIRPORT: &str = "EGLL";

/// Matches returned when a request does not ask for a specific count.
pub const DEFAULT_TOP_K: usize = 5;

/// Largest accepted top-K.
pub const MAX_TOP_K: usize = 20;

/// A curated notice (NOTAM) as stored in the corpus.
///
/// Records are immutable once a snapshot is published; a refresh swaps the
/// whole set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoticeRecord {
    /// Unique record identifier, e.g. `EGLL-2025-001`
    pub id: String,

    /// ICAO airport code
    #[serde(alias = "icao")]
    pub airport: String,

    /// Notice text
    pub text: String,

    /// Optional category (runway, taxiway, navaid, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Start of the effective window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_from: Option<DateTime<Utc>>,

    /// End of the effective window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_to: Option<DateTime<Utc>>,

    /// Precomputed embedding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl NoticeRecord {
    /// Create a record with only the required fields.
    pub fn new(id: impl Into<String>, airport: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            airport: airport.into(),
            text: text.into(),
            category: None,
            effective_from: None,
            effective_to: None,
            embedding: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// A validated question for one airport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Question text, trimmed
    pub text: String,

    /// Uppercased airport code
    pub airport: String,

    /// Requested number of matches (1..=20)
    pub k: usize,
}

impl Query {
    /// Validate raw request parameters.
    ///
    /// The question must be non-empty and `k` must lie in `1..=MAX_TOP_K`.
    /// Missing or blank values take the defaults (`EGLL`, 5).
    pub fn new(text: &str, airport: Option<&str>, k: Option<usize>) -> AppResult<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::InvalidRequest(
                "Query parameter 'q' must not be empty".to_string(),
            ));
        }

        let k = k.unwrap_or(DEFAULT_TOP_K);
        if !(1..=MAX_TOP_K).contains(&k) {
            return Err(AppError::InvalidRequest(format!(
                "Parameter 'k' must be between 1 and {}, got {}",
                MAX_TOP_K, k
            )));
        }

        // Any other code is looked up as-is; one without curated notices
        // simply has no matches.
        let airport = match airport.map(normalize_airport) {
            Some(code) if !code.is_empty() => code,
            _ => DEFAULT_AIRPORT.to_string(),
        };

        Ok(Self {
            text: text.to_string(),
            airport,
            k,
        })
    }

    /// Lowercased, trimmed question used for cache keys.
    pub fn normalized_text(&self) -> String {
        self.text.trim().to_lowercase()
    }
}

/// Normalize an airport code to trimmed uppercase.
pub fn normalize_airport(code: &str) -> String {
    code.trim().to_uppercase()
}

/// The ranking strategy that produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankStrategy {
    Lexical,
    Vector,
}

impl RankStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Vector => "vector",
        }
    }
}

/// A record paired with its relevance score.
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub record: Arc<NoticeRecord>,
    pub score: f32,
    pub strategy: RankStrategy,
}

impl ScoredMatch {
    pub fn id(&self) -> &str {
        &self.record.id
    }
}

/// Order matches by descending score, ties by ascending record id.
pub fn sort_matches(matches: &mut [ScoredMatch]) {
    matches.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
}

/// Outcome of one retrieval.
#[derive(Debug, Clone)]
pub struct Retrieval {
    /// At most K matches, best first
    pub matches: Vec<ScoredMatch>,

    /// Tag of the strategy that actually ran
    pub provider: String,

    /// Whether the configured ranker failed and lexical ranking answered
    pub fell_back: bool,
}

impl Retrieval {
    pub fn empty(provider: impl Into<String>) -> Self {
        Self {
            matches: Vec::new(),
            provider: provider.into(),
            fell_back: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(id: &str, score: f32) -> ScoredMatch {
        ScoredMatch {
            record: Arc::new(NoticeRecord::new(id, "EGLL", "text")),
            score,
            strategy: RankStrategy::Lexical,
        }
    }

    #[test]
    fn test_query_defaults() {
        let query = Query::new("  runway closures  ", None, None).unwrap();
        assert_eq!(query.text, "runway closures");
        assert_eq!(query.airport, "EGLL");
        assert_eq!(query.k, 5);
    }

    #[test]
    fn test_query_normalizes_airport() {
        let query = Query::new("q", Some(" eglc "), Some(3)).unwrap();
        assert_eq!(query.airport, "EGLC");
    }

    #[test]
    fn test_query_rejects_bad_input() {
        assert!(Query::new("   ", None, None).unwrap_err().is_client_error());
        assert!(Query::new("q", None, Some(0)).unwrap_err().is_client_error());
        assert!(Query::new("q", None, Some(21)).unwrap_err().is_client_error());
    }

    #[test]
    fn test_query_accepts_any_airport_code() {
        for code in ["LONDON", "EGLLX", "K1", "EG-LL"] {
            let query = Query::new("q", Some(code), None).unwrap();
            assert_eq!(query.airport, code);
        }
        assert_eq!(Query::new("q", Some("  "), None).unwrap().airport, "EGLL");
    }

    #[test]
    fn test_normalized_text() {
        let query = Query::new("Runway CLOSURES", None, None).unwrap();
        assert_eq!(query.normalized_text(), "runway closures");
    }

    #[test]
    fn test_sort_matches_tie_break() {
        let mut matches = vec![scored("B", 0.5), scored("A", 0.5), scored("C", 0.9)];
        sort_matches(&mut matches);
        let ids: Vec<&str> = matches.iter().map(|m| m.id()).collect();
        assert_eq!(ids, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_record_accepts_icao_alias() {
        let record: NoticeRecord =
            serde_json::from_str(r#"{"id":"X1","icao":"EGLL","text":"t"}"#).unwrap();
        assert_eq!(record.airport, "EGLL");
        assert!(record.embedding.is_none());
    }
}
