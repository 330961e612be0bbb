//! Answer composition from ranked matches.
//!
//! With a generation backend the composer asks it to answer from the matched
//! notices only and validates the citations it returns. Without one, or when
//! generation fails for any reason, the answer is extractive: the top matches
//! joined with a fixed connective, each cited. Composition never fails.

use crate::lexical::tokenize;
use crate::rag::citations::{validate_citations, ValidatedText};
use crate::rag::types::{Answer, CitationHandle};
use crate::retrieval::{provider_tag, PROVIDER_LOCAL_FALLBACK};
use crate::types::{Query, Retrieval, ScoredMatch};
use serde::Serialize;
use skylens_core::{AppError, AppResult};
use skylens_llm::{GenerationBackend, LlmRequest};
use skylens_prompt::{build_prompt, PromptDefinition};
use std::time::Duration;

/// Matches quoted in an extractive answer.
pub const EXTRACTIVE_MATCHES: usize = 3;

/// Joins quoted matches in an extractive answer.
pub const CONNECTIVE: &str = " Additionally, ";

const GENERATION_MAX_TOKENS: u32 = 400;

/// A kind of condition a question can ask about.
struct ConditionFamily {
    label: &'static str,
    /// Tokens in a question that name the family
    asked_by: &'static [&'static str],
    /// Tokens in a notice that report it
    reported_by: &'static [&'static str],
}

// Token forms as produced by `tokenize` (lowercase, plural stripped).
const CONDITION_FAMILIES: &[ConditionFamily] = &[
    ConditionFamily {
        label: "closures",
        asked_by: &["closure", "closed", "close", "closing", "shut"],
        reported_by: &["closed", "closure", "close", "shut"],
    },
    ConditionFamily {
        label: "unserviceable equipment",
        asked_by: &["unserviceable", "unavailable", "outage", "inoperative", "failure"],
        reported_by: &["unserviceable", "unavailable", "inoperative", "outage", "withdrawn"],
    },
    ConditionFamily {
        label: "works in progress",
        asked_by: &["work", "construction", "maintenance", "resurfacing"],
        reported_by: &["work", "construction", "maintenance", "resurfacing"],
    },
    ConditionFamily {
        label: "restrictions",
        asked_by: &["restriction", "restricted", "limit", "limited", "limitation"],
        reported_by: &["restriction", "restricted", "limited", "prohibited"],
    },
    ConditionFamily {
        label: "obstacles",
        asked_by: &["obstacle", "crane", "obstruction"],
        reported_by: &["obstacle", "crane", "obstruction"],
    },
    ConditionFamily {
        label: "lighting outages",
        asked_by: &["lighting", "light", "papi"],
        reported_by: &["lighting", "light", "papi"],
    },
];

/// Notice as handed to the prompt template.
#[derive(Debug, Serialize)]
struct PromptNotice<'a> {
    id: &'a str,
    category: Option<&'a str>,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct PromptVariables<'a> {
    airport: &'a str,
    question: &'a str,
    example_id: &'a str,
    notices: Vec<PromptNotice<'a>>,
}

struct Generative {
    backend: GenerationBackend,
    prompt: PromptDefinition,
    timeout: Duration,
}

/// Turns a retrieval into an [`Answer`].
pub struct AnswerComposer {
    generative: Option<Generative>,
}

impl std::fmt::Debug for AnswerComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerComposer")
            .field(
                "generator",
                &self
                    .generative
                    .as_ref()
                    .map(|g| g.backend.client.provider_name()),
            )
            .finish()
    }
}

impl AnswerComposer {
    /// Composer that only builds extractive answers.
    pub fn extractive() -> Self {
        Self { generative: None }
    }

    /// Composer that asks `backend` first and falls back to extractive.
    pub fn generative(backend: GenerationBackend, prompt: PromptDefinition, timeout: Duration) -> Self {
        Self {
            generative: Some(Generative {
                backend,
                prompt,
                timeout,
            }),
        }
    }

    /// Name of the generation backend, if one is configured.
    pub fn generator_name(&self) -> Option<&str> {
        self.generative
            .as_ref()
            .map(|g| g.backend.client.provider_name())
    }

    /// Compose an answer for `query` from `retrieval`.
    pub async fn compose(&self, query: &Query, retrieval: &Retrieval) -> Answer {
        if retrieval.matches.is_empty() {
            return no_matches(query, retrieval);
        }

        let Some(generative) = &self.generative else {
            return extractive(query, retrieval, retrieval.provider.clone());
        };

        match generate(generative, query, retrieval).await {
            Ok(validated) => {
                let provider = if retrieval.fell_back {
                    PROVIDER_LOCAL_FALLBACK.to_string()
                } else {
                    provider_tag(generative.backend.client.provider_name()).to_string()
                };
                Answer {
                    answer: validated.text,
                    citations: validated.citations,
                    matches: handles(&retrieval.matches),
                    provider,
                }
            }
            Err(e) => {
                tracing::warn!(
                    airport = %query.airport,
                    generator = %generative.backend.client.provider_name(),
                    "Generation failed, answering extractively: {}",
                    e
                );
                extractive(query, retrieval, PROVIDER_LOCAL_FALLBACK.to_string())
            }
        }
    }
}

async fn generate(
    generative: &Generative,
    query: &Query,
    retrieval: &Retrieval,
) -> AppResult<ValidatedText> {
    let variables = PromptVariables {
        airport: &query.airport,
        question: &query.text,
        example_id: retrieval.matches.first().map(|m| m.id()).unwrap_or_default(),
        notices: retrieval
            .matches
            .iter()
            .map(|m| PromptNotice {
                id: m.id(),
                category: m.record.category.as_deref(),
                text: &m.record.text,
            })
            .collect(),
    };
    let built = build_prompt(&generative.prompt, &variables)?;

    let mut request = LlmRequest::new(built.user, generative.backend.model.clone())
        .with_temperature(0.0)
        .with_max_tokens(GENERATION_MAX_TOKENS);
    if let Some(system) = built.system {
        request = request.with_system(system);
    }

    let response = tokio::time::timeout(
        generative.timeout,
        generative.backend.client.complete(&request),
    )
    .await
    .map_err(|_| {
        AppError::BackendUnavailable(format!(
            "Generation timed out after {}s",
            generative.timeout.as_secs_f32()
        ))
    })??;

    let known: Vec<&str> = retrieval.matches.iter().map(|m| m.id()).collect();
    validate_citations(&response.content, &known)
}

fn handles(matches: &[ScoredMatch]) -> Vec<CitationHandle> {
    matches.iter().map(CitationHandle::from).collect()
}

fn no_matches(query: &Query, retrieval: &Retrieval) -> Answer {
    Answer {
        answer: format!(
            "No relevant NOTAMs found for {} matching your question.",
            query.airport
        ),
        citations: Vec::new(),
        matches: Vec::new(),
        provider: retrieval.provider.clone(),
    }
}

/// Quote the top matches, each with its citation.
///
/// When the question asks about a kind of condition none of the quoted
/// notices report, the answer opens by saying so.
fn extractive(query: &Query, retrieval: &Retrieval, provider: String) -> Answer {
    let cited: Vec<&ScoredMatch> = retrieval.matches.iter().take(EXTRACTIVE_MATCHES).collect();

    let quoted: Vec<String> = cited
        .iter()
        .map(|m| {
            let text = m.record.text.trim().trim_end_matches('.');
            format!("{} [{}]", text, m.id())
        })
        .collect();

    let mut answer = String::new();
    for label in unreported_conditions(&query.text, &cited) {
        answer.push_str(&format!("No {} found for {}. ", label, query.airport));
    }
    answer.push_str(&quoted.join(&format!(".{}", CONNECTIVE)));
    answer.push('.');

    Answer {
        answer,
        citations: cited.iter().map(|m| m.id().to_string()).collect(),
        matches: handles(&retrieval.matches),
        provider,
    }
}

fn unreported_conditions(question: &str, cited: &[&ScoredMatch]) -> Vec<&'static str> {
    let asked = tokenize(question);
    let reported: Vec<String> = cited.iter().flat_map(|m| tokenize(&m.record.text)).collect();

    CONDITION_FAMILIES
        .iter()
        .filter(|family| asked.iter().any(|t| family.asked_by.contains(&t.as_str())))
        .filter(|family| {
            !reported
                .iter()
                .any(|t| family.reported_by.contains(&t.as_str()))
        })
        .map(|family| family.label)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::PROVIDER_LOCAL;
    use crate::tests::{generation_backend, ScriptedLlm};
    use crate::types::{NoticeRecord, RankStrategy};
    use skylens_prompt::{builtin_prompt, NOTAM_ANSWER_PROMPT_ID};
    use std::sync::Arc;

    fn scored(id: &str, text: &str, score: f32) -> ScoredMatch {
        ScoredMatch {
            record: Arc::new(NoticeRecord::new(id, "EGLL", text)),
            score,
            strategy: RankStrategy::Lexical,
        }
    }

    fn retrieval(matches: Vec<ScoredMatch>) -> Retrieval {
        Retrieval {
            matches,
            provider: PROVIDER_LOCAL.to_string(),
            fell_back: false,
        }
    }

    fn composer(llm: Arc<ScriptedLlm>, timeout: Duration) -> AnswerComposer {
        AnswerComposer::generative(
            generation_backend(llm),
            builtin_prompt(NOTAM_ANSWER_PROMPT_ID).unwrap(),
            timeout,
        )
    }

    #[tokio::test]
    async fn test_extractive_quotes_top_three() {
        let query = Query::new("closed", Some("EGLL"), None).unwrap();
        let retrieval = retrieval(vec![
            scored("EGLL-2025-002", "TWY A closed.", 0.9),
            scored("EGLL-2025-005", "Stand 512 closed.", 0.8),
            scored("EGLL-2025-006", "Night restrictions closed.", 0.7),
            scored("EGLL-2025-001", "Standard runway operations.", 0.1),
        ]);

        let answer = AnswerComposer::extractive().compose(&query, &retrieval).await;

        assert_eq!(
            answer.answer,
            "TWY A closed [EGLL-2025-002]. Additionally, Stand 512 closed [EGLL-2025-005]. \
             Additionally, Night restrictions closed [EGLL-2025-006]."
        );
        assert_eq!(
            answer.citations,
            vec!["EGLL-2025-002", "EGLL-2025-005", "EGLL-2025-006"]
        );
        assert_eq!(answer.matches.len(), 4);
        assert_eq!(answer.provider, PROVIDER_LOCAL);
    }

    #[tokio::test]
    async fn test_extractive_states_missing_condition() {
        let query = Query::new("runway closures at Heathrow", Some("EGLL"), None).unwrap();
        let retrieval = retrieval(vec![scored(
            "EGLL-2025-001",
            "Standard runway operations in effect.",
            0.3,
        )]);

        let answer = AnswerComposer::extractive().compose(&query, &retrieval).await;

        assert!(answer.answer.starts_with("No closures found for EGLL."));
        assert!(answer.answer.contains("[EGLL-2025-001]"));
        assert_eq!(answer.citations, vec!["EGLL-2025-001"]);
    }

    #[tokio::test]
    async fn test_no_matches_answer() {
        let query = Query::new("closures", Some("ZZZZ"), None).unwrap();
        let answer = AnswerComposer::extractive()
            .compose(&query, &retrieval(Vec::new()))
            .await;

        assert!(answer.answer.starts_with("No relevant NOTAMs found for ZZZZ"));
        assert!(answer.citations.is_empty());
        assert!(answer.matches.is_empty());
        assert_eq!(answer.provider, PROVIDER_LOCAL);
    }

    #[tokio::test]
    async fn test_generative_answer_is_validated() {
        let llm = ScriptedLlm::replying(
            "Taxiway A is closed [EGLL-2025-002, EGLL-2025-404].",
        );
        let query = Query::new("taxiway closures", Some("EGLL"), None).unwrap();
        let retrieval = retrieval(vec![scored("EGLL-2025-002", "TWY A closed.", 0.9)]);

        let answer = composer(Arc::clone(&llm), Duration::from_secs(5))
            .compose(&query, &retrieval)
            .await;

        assert_eq!(answer.answer, "Taxiway A is closed [EGLL-2025-002].");
        assert_eq!(answer.citations, vec!["EGLL-2025-002"]);
        assert_eq!(answer.provider, PROVIDER_LOCAL);
        assert_eq!(llm.calls(), 1);

        let request = llm.last_request().unwrap();
        assert_eq!(request.temperature, Some(0.0));
        assert!(request.prompt.contains("[EGLL-2025-002] TWY A closed."));
        assert!(request.system.unwrap().contains("[EGLL-2025-002]"));
    }

    #[tokio::test]
    async fn test_azure_generation_is_tagged_azure() {
        let llm = ScriptedLlm::replying_as("azure", "Taxiway A is closed [EGLL-2025-002].");
        let query = Query::new("taxiway closures", Some("EGLL"), None).unwrap();
        let retrieval = retrieval(vec![scored("EGLL-2025-002", "TWY A closed.", 0.9)]);

        let answer = composer(llm, Duration::from_secs(5))
            .compose(&query, &retrieval)
            .await;

        assert_eq!(answer.provider, crate::retrieval::PROVIDER_AZURE);
    }

    #[tokio::test]
    async fn test_hallucinated_answer_falls_back_to_extractive() {
        let llm = ScriptedLlm::replying("See EGLL-2025-404 for details [EGLL-2025-002].");
        let query = Query::new("taxiway closures", Some("EGLL"), None).unwrap();
        let retrieval = retrieval(vec![scored("EGLL-2025-002", "TWY A closed.", 0.9)]);

        let answer = composer(llm, Duration::from_secs(5))
            .compose(&query, &retrieval)
            .await;

        assert_eq!(answer.answer, "TWY A closed [EGLL-2025-002].");
        assert_eq!(answer.provider, PROVIDER_LOCAL_FALLBACK);
    }

    #[tokio::test]
    async fn test_backend_failure_falls_back_to_extractive() {
        let llm = ScriptedLlm::failing("connection refused");
        let query = Query::new("taxiway closures", Some("EGLL"), None).unwrap();
        let retrieval = retrieval(vec![scored("EGLL-2025-002", "TWY A closed.", 0.9)]);

        let answer = composer(llm, Duration::from_secs(5))
            .compose(&query, &retrieval)
            .await;

        assert_eq!(answer.citations, vec!["EGLL-2025-002"]);
        assert_eq!(answer.provider, PROVIDER_LOCAL_FALLBACK);
    }

    #[tokio::test]
    async fn test_generation_timeout_falls_back() {
        let llm = ScriptedLlm::replying("Closed [EGLL-2025-002].")
            .with_delay(Duration::from_millis(200));
        let query = Query::new("taxiway closures", Some("EGLL"), None).unwrap();
        let retrieval = retrieval(vec![scored("EGLL-2025-002", "TWY A closed.", 0.9)]);

        let answer = composer(llm, Duration::from_millis(20))
            .compose(&query, &retrieval)
            .await;

        assert_eq!(answer.provider, PROVIDER_LOCAL_FALLBACK);
        assert_eq!(answer.answer, "TWY A closed [EGLL-2025-002].");
    }

    #[tokio::test]
    async fn test_empty_matches_skip_generation() {
        let llm = ScriptedLlm::replying("Closed [EGLL-2025-002].");
        let query = Query::new("closures", Some("ZZZZ"), None).unwrap();

        let answer = composer(Arc::clone(&llm), Duration::from_secs(5))
            .compose(&query, &retrieval(Vec::new()))
            .await;

        assert!(answer.citations.is_empty());
        assert_eq!(llm.calls(), 0);
    }
}
