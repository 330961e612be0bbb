//! Skylens Core Library
//!
//! This crate provides the foundational utilities shared by every Skylens crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management (provider selection, credentials, timeouts)

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, AzureOpenAiConfig, OllamaConfig, RagConfig};
pub use error::{AppError, AppResult};
