use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::sleep;

use crate::{CompletionRequest, Result};

/// Trait for backends that can turn a single request into a raw completion payload.
///
/// Implementations classify failures into the error taxonomy
/// (`ServiceUnavailable`, `RateLimited`, `QuotaExhausted`, ...) but never retry.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Returns the unique identifier for this transport.
    fn name(&self) -> &'static str;

    /// Issues one request and returns the full response payload.
    ///
    /// # Errors
    ///
    /// Returns a classified error if the remote call fails or is rejected.
    async fn complete(&self, request: &CompletionRequest) -> Result<Value>;
}

/// Blocking wait used for retry backoff and request pacing.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Waits for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        sleep(duration).await;
    }
}
