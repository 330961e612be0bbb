//! Answer types returned to callers.

use crate::types::ScoredMatch;
use serde::{Deserialize, Serialize};

/// A match as exposed to callers: the record plus its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationHandle {
    pub id: String,
    pub airport: String,
    pub text: String,
    pub score: f32,
}

impl From<&ScoredMatch> for CitationHandle {
    fn from(scored: &ScoredMatch) -> Self {
        Self {
            id: scored.record.id.clone(),
            airport: scored.record.airport.clone(),
            text: scored.record.text.clone(),
            score: scored.score,
        }
    }
}

/// A composed answer with the records it cites.
///
/// Every entry of `citations` is the id of some entry in `matches`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Answer text
    pub answer: String,

    /// Ids of the cited records, in citation order
    pub citations: Vec<String>,

    /// Ranked matches the answer was composed from
    pub matches: Vec<CitationHandle>,

    /// Strategy that produced the answer (`local`, `local-fallback`, ...)
    pub provider: String,
}

impl Answer {
    /// Whether `id` is one of this answer's matches.
    pub fn has_match(&self, id: &str) -> bool {
        self.matches.iter().any(|m| m.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NoticeRecord, RankStrategy};
    use std::sync::Arc;

    #[test]
    fn test_citation_handle_from_match() {
        let scored = ScoredMatch {
            record: Arc::new(NoticeRecord::new("EGLL-1", "EGLL", "RWY 09L closed")),
            score: 0.42,
            strategy: RankStrategy::Lexical,
        };

        let handle = CitationHandle::from(&scored);
        assert_eq!(handle.id, "EGLL-1");
        assert_eq!(handle.airport, "EGLL");
        assert_eq!(handle.score, 0.42);
    }

    #[test]
    fn test_answer_wire_shape() {
        let answer = Answer {
            answer: "RWY 09L closed [EGLL-1].".to_string(),
            citations: vec!["EGLL-1".to_string()],
            matches: vec![CitationHandle {
                id: "EGLL-1".to_string(),
                airport: "EGLL".to_string(),
                text: "RWY 09L closed".to_string(),
                score: 0.5,
            }],
            provider: "local".to_string(),
        };

        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["provider"], "local");
        assert_eq!(json["citations"][0], "EGLL-1");
        assert_eq!(json["matches"][0]["airport"], "EGLL");
        assert!(answer.has_match("EGLL-1"));
        assert!(!answer.has_match("EGLL-2"));
    }
}
