use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, from_str};
use sibyl_core::config::ENV_OPENAI_API_KEY;
use sibyl_core::{CompletionRequest, CompletionTransport, Error, Result, SibylConfig};

/// Default `OpenAI` API base URL.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Default completion model.
const DEFAULT_MODEL: &str = "gpt-3.5-turbo-instruct";
/// Phrases the service uses when the account quota is used up.
const QUOTA_MARKERS: [&str; 2] = ["exceeded your current quota", "insufficient_quota"];

/// Transport for the `OpenAI` (or compatible) text completions endpoint.
pub struct OpenAiTransport {
    /// HTTP client for API requests.
    client: Client,
    /// API key sent as a bearer token.
    api_key: String,
    /// Base URL; `/completions` is appended.
    base_url: String,
    /// Model name to use.
    model: String,
}

impl OpenAiTransport {
    /// Creates a new `OpenAiTransport` with the given API key.
    ///
    /// # Errors
    /// Returns an error if the provided API key is empty.
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::MissingApiKey(ENV_OPENAI_API_KEY.to_owned()));
        }

        Ok(Self {
            client: Client::default(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
        })
    }

    /// Creates a new `OpenAiTransport` from configuration, falling back to the environment for the key.
    ///
    /// # Errors
    /// Returns an error if no API key is available or the HTTP client cannot be built.
    pub fn from_config(config: &SibylConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key()?,
            base_url: config.api.base_url.clone(),
            model: config.api.model.clone(),
        })
    }

    /// Sets the model to use for generation.
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Sets the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Returns the configured model.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Full URL of the completions endpoint.
    fn endpoint(&self) -> String {
        format!("{}/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Request payload sent to the completions endpoint.
#[derive(Debug, Serialize)]
struct CompletionPayload<'req> {
    /// Model identifier.
    model: &'req str,
    /// Prompt text.
    prompt: &'req str,
    /// Maximum number of tokens to generate.
    max_tokens: u32,
    /// Sampling temperature.
    temperature: f32,
    /// Nucleus sampling mass.
    top_p: f32,
    /// Frequency penalty.
    frequency_penalty: f32,
    /// Presence penalty.
    presence_penalty: f32,
}

/// Error envelope returned by the service on failure.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    /// Error details.
    error: ApiErrorDetail,
}

/// Error details returned by the service.
#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    /// Human readable message.
    #[serde(default)]
    message: Option<String>,
    /// Error category.
    #[serde(default, rename = "type")]
    kind: Option<String>,
    /// Machine readable error code.
    #[serde(default)]
    code: Option<Value>,
}

impl ApiErrorDetail {
    /// Checks whether any field names the account quota as the cause.
    fn mentions_quota(&self) -> bool {
        let code = self.code.as_ref().and_then(Value::as_str);
        [self.message.as_deref(), self.kind.as_deref(), code]
            .into_iter()
            .flatten()
            .any(text_mentions_quota)
    }
}

/// Checks a message for one of the quota markers.
fn text_mentions_quota(text: &str) -> bool {
    QUOTA_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Maps a non-success response to the error taxonomy.
///
/// `503` becomes `ServiceUnavailable`, `429` becomes `QuotaExhausted` when the
/// body names the account quota and `RateLimited` otherwise, and every other
/// status becomes an unclassified `Api` error.
pub fn classify_failure(status: u16, body: &str) -> Error {
    let detail = from_str::<ApiErrorBody>(body)
        .ok()
        .map(|parsed| parsed.error);
    let message = detail
        .as_ref()
        .and_then(|parsed| parsed.message.clone())
        .unwrap_or_else(|| body.to_owned());

    match StatusCode::from_u16(status) {
        Ok(StatusCode::SERVICE_UNAVAILABLE) => Error::ServiceUnavailable(message),
        Ok(StatusCode::TOO_MANY_REQUESTS) => {
            let quota = detail
                .as_ref()
                .map_or_else(|| text_mentions_quota(body), ApiErrorDetail::mentions_quota);
            if quota {
                Error::QuotaExhausted(message)
            } else {
                Error::RateLimited(message)
            }
        }
        _ => Error::Api { status, message },
    }
}

#[async_trait]
impl CompletionTransport for OpenAiTransport {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Value> {
        let start = Instant::now();

        let payload = CompletionPayload {
            model: &self.model,
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
            temperature: request.sampling.temperature,
            top_p: request.sampling.top_p,
            frequency_penalty: request.sampling.frequency_penalty,
            presence_penalty: request.sampling.presence_penalty,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), &body));
        }

        tracing::debug!(
            "OpenAI completion for {} took {}ms",
            self.model,
            start.elapsed().as_millis()
        );

        from_str(&body)
            .map_err(|err| Error::InvalidResponse(format!("Failed to parse OpenAI response: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_transport_rejects_empty_key() {
        assert!(matches!(
            OpenAiTransport::new(String::new()),
            Err(Error::MissingApiKey(_))
        ));
    }

    #[test]
    fn openai_transport_endpoint() {
        let transport = OpenAiTransport::new("test_key".to_owned())
            .map(|transport| transport.with_base_url("http://localhost:8080/v1/".to_owned()));
        assert_eq!(
            transport.map(|built| built.endpoint()).ok(),
            Some("http://localhost:8080/v1/completions".to_owned())
        );
    }

    #[test]
    fn openai_transport_from_config() {
        let mut config = SibylConfig::default();
        config.api.api_key = Some("sk-config".to_owned());
        config.api.model = "davinci-002".to_owned();

        let transport =
            OpenAiTransport::from_config(&config).expect("transport should build from config");
        assert_eq!(transport.model(), "davinci-002");
        assert_eq!(transport.name(), "OpenAI");
    }

    #[test]
    fn classify_service_unavailable() {
        let error = classify_failure(
            503,
            r#"{"error":{"message":"The server is overloaded or not ready yet.","type":"server_error"}}"#,
        );
        assert!(matches!(error, Error::ServiceUnavailable(ref message) if message.contains("overloaded")));
        assert!(error.is_retryable());
    }

    #[test]
    fn classify_hard_quota() {
        let error = classify_failure(
            429,
            r#"{"error":{"message":"You exceeded your current quota, please check your plan and billing details.","type":"insufficient_quota","code":"insufficient_quota"}}"#,
        );
        assert!(matches!(error, Error::QuotaExhausted(_)));
        assert!(!error.is_retryable());
    }

    #[test]
    fn classify_quota_by_code_only() {
        let error = classify_failure(
            429,
            r#"{"error":{"message":"Billing issue","type":"requests","code":"insufficient_quota"}}"#,
        );
        assert!(matches!(error, Error::QuotaExhausted(_)));
    }

    #[test]
    fn classify_soft_rate_limit() {
        let error = classify_failure(
            429,
            r#"{"error":{"message":"Rate limit reached for requests","type":"requests","code":"rate_limit_exceeded"}}"#,
        );
        assert!(matches!(error, Error::RateLimited(_)));
        assert!(error.is_retryable());
    }

    #[test]
    fn classify_non_json_bodies() {
        assert!(matches!(
            classify_failure(429, "You exceeded your current quota"),
            Error::QuotaExhausted(_)
        ));
        assert!(matches!(
            classify_failure(429, "Too Many Requests"),
            Error::RateLimited(_)
        ));
        assert!(matches!(
            classify_failure(502, "Bad Gateway"),
            Error::Api { status: 502, .. }
        ));
    }

    #[test]
    fn classify_other_statuses_are_unclassified() {
        let error = classify_failure(
            401,
            r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#,
        );
        assert!(
            matches!(error, Error::Api { status: 401, ref message } if message == "Incorrect API key provided")
        );
        assert!(!error.is_retryable());
    }
}
