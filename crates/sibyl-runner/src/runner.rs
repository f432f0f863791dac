//! Cache-aware batch orchestration.
//!
//! Users are processed strictly one after another. A cache hit reuses the
//! stored completion with no remote call and no delay; a miss goes through
//! the completion client, is written through to the cache, and is followed
//! by a fixed pause before the next request.

use crate::PromptStore;
use sibyl_cache::{CacheEntry, CacheKey, ResponseCache};
use sibyl_core::{CompletionResult, Result, Sleeper};
use sibyl_providers::CompletionClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Pause after every successful live request.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(5);

/// Outcome of a full run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// One row per input user, in input order
    pub results: Vec<CompletionResult>,
    /// Users answered from the cache
    pub cache_hits: usize,
    /// Users answered by a live request
    pub live_calls: usize,
}

/// Drives every prompt through the cache and the completion client.
pub struct InferenceRunner {
    /// Client used on cache misses.
    client: CompletionClient,
    /// Timer used for the inter-request delay.
    sleeper: Arc<dyn Sleeper>,
    /// Pause after each live request.
    request_delay: Duration,
    /// Token budget per completion.
    max_tokens: u32,
}

impl InferenceRunner {
    /// Creates a runner with the default delay and a one-token budget.
    pub fn new(client: CompletionClient, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            client,
            sleeper,
            request_delay: DEFAULT_REQUEST_DELAY,
            max_tokens: 1,
        }
    }

    /// Sets the pause applied after each live request.
    #[must_use]
    pub fn with_request_delay(mut self, request_delay: Duration) -> Self {
        self.request_delay = request_delay;
        self
    }

    /// Sets the token budget per completion.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Produces one prediction per user.
    ///
    /// # Errors
    /// Stops at the first user whose completion fails or whose result cannot
    /// be persisted. Entries cached before the failure remain on disk.
    pub async fn run(&self, prompts: &PromptStore, cache: &mut ResponseCache) -> Result<RunReport> {
        let total = prompts.len();
        let mut report = RunReport {
            results: Vec::with_capacity(total),
            ..RunReport::default()
        };

        for (position, record) in prompts.iter().enumerate() {
            let key = CacheKey::from_prompt(&record.prompt);

            let prediction = match cache.lookup(&key).map(|entry| entry.text.clone()) {
                Some(text) => {
                    debug!("[{}/{total}] {}: cache hit {}", position + 1, record.user_id, key.short());
                    report.cache_hits += 1;
                    text
                }
                None => {
                    debug!(
                        "[{}/{total}] {}: requesting completion from {}",
                        position + 1,
                        record.user_id,
                        self.client.transport_name()
                    );
                    let completion = self
                        .client
                        .complete(&record.prompt, self.max_tokens)
                        .await
                        .inspect_err(|failure| {
                            error!("Completion for user {} failed: {failure}", record.user_id);
                        })?;
                    let text = completion.text.clone();
                    cache.insert(key, CacheEntry::from(completion))?;
                    report.live_calls += 1;
                    self.sleeper.sleep(self.request_delay).await;
                    text
                }
            };

            report.results.push(CompletionResult {
                user_id: record.user_id.clone(),
                prompt: record.prompt.clone(),
                prediction,
            });
        }

        info!(
            "Run finished: {} users, {} cache hits, {} live calls, {} cached entries",
            report.results.len(),
            report.cache_hits,
            report.live_calls,
            cache.len()
        );

        Ok(report)
    }
}
