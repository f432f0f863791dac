//! Mock transport for testing completion runs.
//!
//! Replays a script of failures and answers, enabling end-to-end tests of
//! caching, retry and pacing behaviour without real API calls.

use async_trait::async_trait;
use serde_json::{Value, json};
use sibyl_core::{CompletionRequest, CompletionTransport, Error, Result, Sleeper};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Failure a [`MockTransport`] can be scripted to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedFailure {
    /// Transient service outage.
    ServiceUnavailable,
    /// Soft rate limit.
    RateLimited,
    /// Hard account quota exhaustion.
    QuotaExhausted,
    /// Unclassified API error with the given status.
    Api(u16),
}

impl ScriptedFailure {
    /// Builds the error this failure stands for.
    fn to_error(&self) -> Error {
        match self {
            Self::ServiceUnavailable => Error::ServiceUnavailable("scripted outage".to_owned()),
            Self::RateLimited => Error::RateLimited("scripted rate limit".to_owned()),
            Self::QuotaExhausted => {
                Error::QuotaExhausted("You exceeded your current quota".to_owned())
            }
            Self::Api(status) => Error::Api {
                status: *status,
                message: "scripted API error".to_owned(),
            },
        }
    }
}

/// One scripted outcome.
#[derive(Debug, Clone)]
enum Step {
    /// Fail with the given error.
    Fail(ScriptedFailure),
    /// Answer with the given text.
    Answer(String),
}

/// Locks a mutex, ignoring poisoning from a panicked test thread.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transport that replays scripted outcomes, then answers from fixed responses.
///
/// Scripted steps are consumed in order, one per call. Once the script is
/// empty, a response registered for the exact prompt is used, then the
/// default response.
#[derive(Clone, Default)]
pub struct MockTransport {
    /// Outcomes consumed before falling back to responses
    script: Arc<Mutex<VecDeque<Step>>>,
    /// Answers keyed by exact prompt text
    responses: Arc<Mutex<HashMap<String, String>>>,
    /// Answer if no prompt matches
    default_response: Arc<Mutex<Option<String>>>,
    /// Prompts of every call, including failed ones
    call_history: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    /// Create a new mock transport with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure for the next unscripted call.
    #[must_use]
    pub fn then_fail(self, failure: ScriptedFailure) -> Self {
        lock(&self.script).push_back(Step::Fail(failure));
        self
    }

    /// Queue an answer for the next unscripted call.
    #[must_use]
    pub fn then_answer(self, text: impl Into<String>) -> Self {
        lock(&self.script).push_back(Step::Answer(text.into()));
        self
    }

    /// Answer a specific prompt with a fixed text.
    #[must_use]
    pub fn with_response(self, prompt: impl Into<String>, text: impl Into<String>) -> Self {
        lock(&self.responses).insert(prompt.into(), text.into());
        self
    }

    /// Set a default answer for prompts without a registered response.
    #[must_use]
    pub fn with_default_response(self, text: impl Into<String>) -> Self {
        *lock(&self.default_response) = Some(text.into());
        self
    }

    /// Get the call history (prompts of all calls made).
    #[must_use]
    pub fn get_call_history(&self) -> Vec<String> {
        lock(&self.call_history).clone()
    }

    /// Get the number of calls made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        lock(&self.call_history).len()
    }

    /// Wrap an answer in the shape of a completions API payload.
    fn payload(text: &str, call_index: usize) -> Value {
        json!({
            "id": format!("cmpl-mock-{call_index}"),
            "object": "text_completion",
            "model": "mock",
            "choices": [{
                "text": format!(" {text}\n"),
                "index": 0,
                "finish_reason": "stop"
            }]
        })
    }
}

#[async_trait]
impl CompletionTransport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Value> {
        let call_index = {
            let mut history = lock(&self.call_history);
            history.push(request.prompt.clone());
            history.len()
        };

        let step = lock(&self.script).pop_front();
        let text = match step {
            Some(Step::Fail(failure)) => return Err(failure.to_error()),
            Some(Step::Answer(text)) => text,
            None => {
                let registered = lock(&self.responses).get(&request.prompt).cloned();
                registered
                    .or_else(|| lock(&self.default_response).clone())
                    .ok_or_else(|| Error::Other(format!("no mock response for {:?}", request.prompt)))?
            }
        };

        Ok(Self::payload(&text, call_index))
    }
}

/// Sleeper that records requested waits instead of sleeping.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    /// Every duration passed to `sleep`
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Creates a sleeper with no recorded waits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded waits in call order.
    #[must_use]
    pub fn waits(&self) -> Vec<Duration> {
        lock(&self.waits).clone()
    }

    /// Returns the number of recorded waits.
    #[must_use]
    pub fn count(&self) -> usize {
        lock(&self.waits).len()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.waits).push(duration);
    }
}
