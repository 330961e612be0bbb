//! Post-hoc validation of citations in generated answers.
//!
//! Generated text cites records as `[ID]` or `[ID1, ID2]`. Bracketed ids that
//! are not in the match set are stripped; a bracket group left without any
//! known id is removed entirely. An unknown id mentioned outside brackets
//! cannot be stripped without changing the sentence, so the whole answer is
//! rejected. An answer that cites nothing is rejected too.

use regex::Regex;
use skylens_core::{AppError, AppResult};
use std::sync::LazyLock;

/// A bracket group such as `[EGLL-2025-001]` or `[EGLL-2025-001, EGLL-2025-004]`.
static BRACKET_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]+)\]").expect("bracket pattern compiles"));

/// Record ids as they appear in running text, in any case: an ICAO prefix
/// followed by numeric groups (`EGLL-2025-001`, `egll-25-9`) or the ICAO
/// series form `A1234/25`.
static BARE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:[A-Z]{3,4}-[0-9]+(?:-[0-9]+)*|[A-Z][0-9]{4}/[0-9]{2})\b")
        .expect("id pattern compiles")
});

/// A single bracket entry that looks like an id rather than prose: letters
/// and digits joined by hyphens or slashes, or an ICAO prefix followed by
/// space-separated numeric groups (`EGLL 2025 999`).
static BRACKET_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:[A-Z0-9]+(?:[-/][A-Z0-9]+)+|[A-Z]{3,4}(?:\s+[0-9]+){2,})$")
        .expect("bracket id pattern compiles")
});

static SPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]{2,}").expect("space pattern compiles"));

static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([.,;:!?])").expect("punctuation pattern compiles"));

/// Generated text after citation validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedText {
    /// Text with unknown bracketed ids removed
    pub text: String,

    /// Known ids cited in brackets, first occurrence order, no duplicates
    pub citations: Vec<String>,
}

/// Validate generated `text` against the ids of the actual matches.
///
/// # Errors
/// `AppError::Llm` when the text mentions an unknown id outside brackets or
/// cites no known id at all.
pub fn validate_citations(text: &str, known_ids: &[&str]) -> AppResult<ValidatedText> {
    let mut output = String::with_capacity(text.len());
    let mut citations: Vec<String> = Vec::new();
    let mut last = 0;

    for group in BRACKET_GROUP.captures_iter(text) {
        let (Some(whole), Some(inner)) = (group.get(0), group.get(1)) else {
            continue;
        };

        let prose = &text[last..whole.start()];
        reject_unknown_bare_ids(prose, known_ids)?;
        output.push_str(prose);
        last = whole.end();

        let parts: Vec<&str> = inner
            .as_str()
            .split([',', ';'])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let cites_something = parts
            .iter()
            .any(|p| resolve(p, known_ids).is_some() || is_bracket_id(p));
        if !cites_something {
            // Not a citation, e.g. "[sic]"
            output.push_str(whole.as_str());
            continue;
        }

        let mut kept: Vec<&str> = Vec::new();
        for part in parts {
            match resolve(part, known_ids) {
                Some(id) => {
                    if !kept.contains(&id) {
                        kept.push(id);
                    }
                }
                None if is_bracket_id(part) => {
                    tracing::debug!(id = %part, "Stripping citation of unknown record");
                }
                None => {}
            }
        }

        if kept.is_empty() {
            continue;
        }

        for id in &kept {
            if !citations.iter().any(|c| c == id) {
                citations.push((*id).to_string());
            }
        }
        output.push('[');
        output.push_str(&kept.join(", "));
        output.push(']');
    }

    let tail = &text[last..];
    reject_unknown_bare_ids(tail, known_ids)?;
    output.push_str(tail);

    if citations.is_empty() {
        return Err(AppError::Llm(
            "Generated answer cites none of the retrieved notices".to_string(),
        ));
    }

    Ok(ValidatedText {
        text: tidy(&output),
        citations,
    })
}

/// Id comparison form: uppercase, with whitespace runs read as hyphens.
fn canonical(id: &str) -> String {
    id.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_uppercase()
}

/// The known id `candidate` names, however it was cased or spaced.
fn resolve<'a>(candidate: &str, known_ids: &[&'a str]) -> Option<&'a str> {
    let wanted = canonical(candidate);
    known_ids.iter().copied().find(|id| canonical(id) == wanted)
}

fn is_bracket_id(part: &str) -> bool {
    BRACKET_ID.is_match(part) && part.chars().any(|c| c.is_ascii_digit())
}

fn reject_unknown_bare_ids(prose: &str, known_ids: &[&str]) -> AppResult<()> {
    match BARE_ID
        .find_iter(prose)
        .find(|m| resolve(m.as_str(), known_ids).is_none())
    {
        Some(unknown) => Err(AppError::Llm(format!(
            "Generated answer mentions unknown notice '{}'",
            unknown.as_str()
        ))),
        None => Ok(()),
    }
}

/// Collapse whitespace left behind by removed citations.
fn tidy(text: &str) -> String {
    let collapsed = SPACE_RUN.replace_all(text, " ");
    SPACE_BEFORE_PUNCT
        .replace_all(&collapsed, "$1")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &[&str] = &["EGLL-2025-001", "EGLL-2025-004"];

    #[test]
    fn test_known_citations_pass_through() {
        let validated = validate_citations(
            "RWY 09L is closed [EGLL-2025-004]. Normal ops on 27R [EGLL-2025-001].",
            KNOWN,
        )
        .unwrap();

        assert_eq!(validated.citations, vec!["EGLL-2025-004", "EGLL-2025-001"]);
        assert_eq!(
            validated.text,
            "RWY 09L is closed [EGLL-2025-004]. Normal ops on 27R [EGLL-2025-001]."
        );
    }

    #[test]
    fn test_unknown_bracketed_id_is_stripped() {
        let validated = validate_citations(
            "RWY 09L is closed [EGLL-2025-004, EGLL-2025-999]. Crane east [EGLL-2025-777].",
            KNOWN,
        )
        .unwrap();

        assert_eq!(validated.citations, vec!["EGLL-2025-004"]);
        assert_eq!(validated.text, "RWY 09L is closed [EGLL-2025-004]. Crane east.");
    }

    #[test]
    fn test_unknown_bare_id_rejects_answer() {
        let err = validate_citations(
            "See EGLL-2025-999 for closures [EGLL-2025-001].",
            KNOWN,
        )
        .unwrap_err();
        assert!(err.to_string().contains("EGLL-2025-999"));
    }

    #[test]
    fn test_answer_without_citations_is_rejected() {
        assert!(validate_citations("Runways are open.", KNOWN).is_err());
        assert!(validate_citations("Runways are open [EGLL-2025-123].", KNOWN).is_err());
    }

    #[test]
    fn test_non_citation_brackets_are_kept() {
        let validated =
            validate_citations("Lights [sic] unserviceable [EGLL-2025-001; EGLL-2025-001].", KNOWN)
                .unwrap();

        assert_eq!(validated.citations, vec!["EGLL-2025-001"]);
        assert_eq!(validated.text, "Lights [sic] unserviceable [EGLL-2025-001].");
    }

    #[test]
    fn test_unknown_ids_caught_in_any_case_or_spacing() {
        let validated = validate_citations(
            "Taxiway closed [egll-2025-999] and [EGLL-2025-001]. Crane [EGLL 2025 998].",
            KNOWN,
        )
        .unwrap();

        assert_eq!(validated.citations, vec!["EGLL-2025-001"]);
        assert_eq!(validated.text, "Taxiway closed and [EGLL-2025-001]. Crane.");
    }

    #[test]
    fn test_known_id_in_other_case_is_normalized() {
        let validated =
            validate_citations("Crane east [egll-2025-004, EGLL 2025 001].", KNOWN).unwrap();

        assert_eq!(validated.citations, vec!["EGLL-2025-004", "EGLL-2025-001"]);
        assert_eq!(validated.text, "Crane east [EGLL-2025-004, EGLL-2025-001].");
    }

    #[test]
    fn test_unknown_bare_id_of_other_shape_rejects_answer() {
        for text in [
            "EGLC-25-999 is in force [EGLL-2025-001].",
            "See egll-2025-999 [EGLL-2025-001].",
            "Series A0042/25 applies [EGLL-2025-001].",
        ] {
            assert!(validate_citations(text, KNOWN).is_err(), "{text}");
        }
    }

    #[test]
    fn test_known_bare_id_is_allowed() {
        let validated =
            validate_citations("EGLL-2025-001 remains in force [EGLL-2025-001].", KNOWN).unwrap();
        assert_eq!(validated.citations, vec!["EGLL-2025-001"]);
    }
}
