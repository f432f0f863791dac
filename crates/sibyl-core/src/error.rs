use core::result::Result as CoreResult;
use std::io::Error as IoError;
use std::path::PathBuf;

use csv::Error as CsvError;
use reqwest::Error as ReqwestError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for sibyl operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur while preparing prompts, caching completions or talking to the API.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// An HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Request(#[from] ReqwestError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// Writing the output table failed.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required API key was not found.
    #[error("API key not found: {0}")]
    MissingApiKey(String),

    /// The completion service reported itself unavailable.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The completion service throttled the request (soft rate limit).
    #[error("Rate limit hit: {0}")]
    RateLimited(String),

    /// The account quota behind the API key is used up.
    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    /// The completion service answered with an error that has no dedicated handling.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code of the response.
        status: u16,
        /// Error body or message returned by the service.
        message: String,
    },

    /// The completion service returned a payload without usable text.
    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    /// The persisted response cache could not be deserialized.
    #[error("Corrupt response cache at {}: {source}", path.display())]
    CorruptCache {
        /// Location of the cache file.
        path: PathBuf,
        /// Underlying deserialization failure.
        source: SerdeJsonError,
    },

    /// The prompt input file does not have the expected shape.
    #[error("Invalid prompt input: {0}")]
    InvalidPrompts(String),

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Determines whether this error may succeed if the same request is retried.
    ///
    /// Only transient remote conditions qualify: the service being unavailable
    /// and soft rate limiting. Quota exhaustion never clears on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_) | Self::RateLimited(_))
    }

    /// Determines whether this error needs an operator before any further run can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::QuotaExhausted(_) | Self::CorruptCache { .. })
    }
}
