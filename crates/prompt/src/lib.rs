//! Prompt system for Skylens.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions (a built-in `notam.answer` plus workspace overrides)
//! - Handlebars rendering of the system and user messages

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{builtin_prompt, list_prompts, load_prompt, NOTAM_ANSWER_PROMPT_ID};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptBehavior, PromptDefinition, PromptOutputSpec};
