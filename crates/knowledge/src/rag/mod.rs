//! Grounded answering over retrieved notices.
//!
//! Provides the answer composer (generative with extractive fallback) and
//! post-hoc citation validation.

pub mod citations;
pub mod compose;
pub mod types;

pub use citations::{validate_citations, ValidatedText};
pub use compose::AnswerComposer;
pub use types::{Answer, CitationHandle};
