//! Persistent response caching keyed by prompt content.
//!
//! Completions are stored under the SHA-256 digest of the prompt and written
//! through to a single JSON file on every insert, so repeated runs never pay
//! twice for the same request.

/// Content-addressed cache keys.
pub mod key;
/// Write-through cache storage.
pub mod storage;

pub use key::CacheKey;
pub use storage::{CacheEntry, CacheStats, ResponseCache};
