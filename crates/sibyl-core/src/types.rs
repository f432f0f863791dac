use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A prepared prompt for one user, produced upstream and consumed as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRecord {
    /// Opaque user identifier.
    pub user_id: String,
    /// Fully rendered prompt text.
    pub prompt: String,
}

impl PromptRecord {
    /// Creates a new record.
    pub fn new<U: Into<String>, P: Into<String>>(user_id: U, prompt: P) -> Self {
        Self {
            user_id: user_id.into(),
            prompt: prompt.into(),
        }
    }
}

/// Sampling configuration sent with every completion request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling mass.
    pub top_p: f32,
    /// Frequency penalty.
    pub frequency_penalty: f32,
    /// Presence penalty.
    pub presence_penalty: f32,
}

impl SamplingParams {
    /// Greedy decoding: temperature 0, full nucleus, no penalties.
    pub const fn deterministic() -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self::deterministic()
    }
}

/// A single live completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Prompt text.
    pub prompt: String,
    /// Token budget for the completion.
    pub max_tokens: u32,
    /// Sampling configuration.
    pub sampling: SamplingParams,
}

impl CompletionRequest {
    /// Creates a request with deterministic sampling.
    pub fn new<T: Into<String>>(prompt: T, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            sampling: SamplingParams::deterministic(),
        }
    }
}

/// Parsed outcome of a successful completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    /// First candidate's text, trimmed.
    pub text: String,
    /// Full response payload as returned by the service.
    pub raw: Value,
}

/// One row of the output table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    /// User the prediction belongs to.
    pub user_id: String,
    /// Prompt that produced the prediction.
    pub prompt: String,
    /// Completion text.
    pub prediction: String,
}
