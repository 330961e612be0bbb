//! Error types for Skylens.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! backend, corpus and request-validation failures. The retrieval pipeline
//! relies on the variant to decide between falling back and failing.

use thiserror::Error;

/// Unified error type for Skylens.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors that are not transport failures
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// No curated notices exist for the airport.
    #[error("No curated NOTAM data for airport '{airport}'")]
    CorpusUnavailable { airport: String },

    /// An embedding or generation backend is unreachable, rejected the call,
    /// or timed out.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A stored record embedding does not match the query embedding length.
    #[error(
        "Embedding dimension mismatch for record '{record}': expected {expected}, got {actual}"
    )]
    EmbeddingDimensionMismatch {
        record: String,
        expected: usize,
        actual: usize,
    },

    /// The corpus itself is inconsistent (duplicate ids, bad windows, ...).
    #[error("Corpus integrity error: {0}")]
    CorpusIntegrity(String),

    /// Malformed caller input.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error should trigger a fallback to the next-cheaper strategy.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(self, AppError::BackendUnavailable(_))
    }

    /// Whether the caller sent a malformed request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::InvalidRequest(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
