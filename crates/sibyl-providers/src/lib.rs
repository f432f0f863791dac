//! Completion transports and the retrying completion client.

/// Retrying completion client.
pub mod client;
/// Scripted transport and recording sleeper for tests.
pub mod mock;
/// `OpenAI`-compatible completions transport.
pub mod openai;

pub use client::{CompletionClient, DEFAULT_RETRY_BACKOFF, parse_completion_text};
pub use mock::{MockTransport, RecordingSleeper, ScriptedFailure};
pub use openai::{OpenAiTransport, classify_failure};
