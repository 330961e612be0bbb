//! Command handlers for the Skylens CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod corpus;
pub mod serve;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use corpus::CorpusCommand;
pub use serve::ServeCommand;
