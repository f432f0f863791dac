//! Batch inference over prepared prompts.
//!
//! This crate loads per-user prompts, drives them through the response cache
//! and completion client, writes the prediction table, and builds prompts
//! from raw message history.

/// Prediction table output.
pub mod output;
/// Prompt construction from message history.
pub mod prepare;
/// Per-user prompt input.
pub mod prompts;
/// Cache-aware batch orchestration.
pub mod runner;

pub use output::write_results;
pub use prepare::{
    Message, PreparedPrompt, PromptTemplates, UserMessages, aggregate_messages, build_prompts,
    load_message_history, write_prepared,
};
pub use prompts::PromptStore;
pub use runner::{DEFAULT_REQUEST_DELAY, InferenceRunner, RunReport};
