//! Core types and traits for sibyl.
//!
//! This crate provides the error taxonomy, request and result types, the
//! transport and pacing seams, and configuration shared across the workspace.

/// Configuration loading and defaults.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Trait definitions for completion transports and pacing.
pub mod traits;
/// Core data types for prompts, requests and results.
pub mod types;

pub use config::SibylConfig;
pub use error::{Error, Result};
pub use traits::{CompletionTransport, Sleeper, TokioSleeper};
pub use types::{Completion, CompletionRequest, CompletionResult, PromptRecord, SamplingParams};
