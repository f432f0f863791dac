use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use sibyl_core::{Completion, CompletionRequest, CompletionTransport, Error, Result, Sleeper};
use tracing::{debug, error, warn};

/// Wait applied before retrying a transient failure.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(20);

/// Issues completion requests and retries transient failures.
///
/// Service-unavailable and soft rate-limit errors are retried after a fixed
/// backoff with no attempt ceiling. Quota exhaustion and every other error
/// are returned to the caller on the first occurrence.
pub struct CompletionClient {
    /// Backend performing the actual request.
    transport: Arc<dyn CompletionTransport>,
    /// Timer used for the retry backoff.
    sleeper: Arc<dyn Sleeper>,
    /// Wait between attempts of the same request.
    retry_backoff: Duration,
}

impl CompletionClient {
    /// Creates a client with the default retry backoff.
    pub fn new(transport: Arc<dyn CompletionTransport>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            transport,
            sleeper,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Sets the wait applied before each retry.
    #[must_use]
    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// Returns the name of the underlying transport.
    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Requests a completion for `prompt` with deterministic sampling.
    ///
    /// # Errors
    ///
    /// Returns `QuotaExhausted` when the key's quota is used up, `InvalidResponse`
    /// when the payload carries no text, and any unclassified transport error as-is.
    pub async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<Completion> {
        let request = CompletionRequest::new(prompt, max_tokens);
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            match self.transport.complete(&request).await {
                Ok(raw) => {
                    debug!(
                        "{} completion succeeded after {attempt} attempt(s)",
                        self.transport.name()
                    );
                    let text = parse_completion_text(&raw)?;
                    return Ok(Completion { text, raw });
                }
                Err(failure) if failure.is_retryable() => {
                    warn!(
                        "{failure}; retrying in {}s (attempt {attempt})",
                        self.retry_backoff.as_secs()
                    );
                    self.sleeper.sleep(self.retry_backoff).await;
                }
                Err(failure @ Error::QuotaExhausted(_)) => {
                    error!("Key exhausted; use a different key and re-run");
                    return Err(failure);
                }
                Err(failure) => return Err(failure),
            }
        }
    }
}

/// Extracts the trimmed text of the first candidate from a raw response.
///
/// # Errors
///
/// Returns `InvalidResponse` if there is no first choice or its `text` is not a string.
pub fn parse_completion_text(raw: &Value) -> Result<String> {
    raw.get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("text"))
        .and_then(Value::as_str)
        .map(|text| text.trim().to_owned())
        .ok_or_else(|| Error::InvalidResponse("response has no choices[0].text".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_trims_first_choice() {
        let raw = json!({
            "choices": [{ "text": "\n\n yes \n" }, { "text": "no" }]
        });
        assert_eq!(parse_completion_text(&raw).ok(), Some("yes".to_owned()));
    }

    #[test]
    fn test_parse_rejects_missing_choices() {
        assert!(matches!(
            parse_completion_text(&json!({ "choices": [] })),
            Err(Error::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_completion_text(&json!({ "object": "text_completion" })),
            Err(Error::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_completion_text(&json!({ "choices": [{ "text": 7 }] })),
            Err(Error::InvalidResponse(_))
        ));
    }
}
