//! Command handlers for CLI operations

use anyhow::{Context as _, Result};
use sibyl_cache::ResponseCache;
use sibyl_core::{Error, SibylConfig, Sleeper, TokioSleeper};
use sibyl_providers::{CompletionClient, OpenAiTransport};
use sibyl_runner::{
    InferenceRunner, PromptStore, PromptTemplates, build_prompts, load_message_history,
    write_prepared, write_results,
};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cli::{PrepareArgs, RunArgs};

/// Exit code when the API key has no quota left.
pub const EXIT_QUOTA_EXHAUSTED: u8 = 3;
/// Exit code when the cache file cannot be parsed.
pub const EXIT_CORRUPT_CACHE: u8 = 4;

/// Loads the config from `path`, or from `~/.sibyl/config.toml` when none is given.
///
/// # Errors
/// Returns an error if an explicitly named config file cannot be loaded.
pub fn load_config(path: Option<&Path>) -> Result<SibylConfig> {
    if let Some(path) = path {
        return SibylConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    Ok(SibylConfig::load_or_create().unwrap_or_else(|error| {
        warn!("Failed to load config from ~/.sibyl/config.toml: {error}");
        warn!("Using default configuration");
        SibylConfig::default()
    }))
}

/// Folds command-line overrides into the loaded config.
fn apply_overrides(config: &mut SibylConfig, args: &RunArgs) {
    if let Some(cache_path) = &args.cache_path {
        config.paths.cache_path.clone_from(cache_path);
    }
    if let Some(max_tokens) = args.max_tokens {
        config.generation.max_tokens = max_tokens;
    }
    if let Some(model) = &args.model {
        config.api.model.clone_from(model);
    }
}

/// Handle `sibyl run`
///
/// # Errors
/// Returns an error if inputs cannot be loaded, a completion fails fatally,
/// or the prediction table cannot be written.
pub async fn handle_run(config_path: Option<&Path>, args: &RunArgs) -> Result<()> {
    let mut config = load_config(config_path)?;
    apply_overrides(&mut config, args);

    let prompts = PromptStore::load(&args.data_path)
        .with_context(|| format!("Failed to load prompts from {}", args.data_path.display()))?;
    let mut cache = ResponseCache::open(&config.paths.cache_path)?;

    let transport = OpenAiTransport::from_config(&config)?;
    info!("Using model {}", transport.model());

    let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);
    let client = CompletionClient::new(Arc::new(transport), Arc::clone(&sleeper))
        .with_retry_backoff(config.pacing.retry_backoff());
    let runner = InferenceRunner::new(client, sleeper)
        .with_request_delay(config.pacing.request_delay())
        .with_max_tokens(config.generation.max_tokens);

    let report = runner.run(&prompts, &mut cache).await?;
    write_results(&args.save_path, &report.results)
        .with_context(|| format!("Failed to write {}", args.save_path.display()))?;

    Ok(())
}

/// Handle `sibyl prepare`
///
/// # Errors
/// Returns an error if the history or templates cannot be loaded, the
/// template cannot be rendered, or the output cannot be written.
pub fn handle_prepare(args: &PrepareArgs) -> Result<()> {
    let history = load_message_history(&args.data_path).with_context(|| {
        format!("Failed to load message history from {}", args.data_path.display())
    })?;
    let templates = PromptTemplates::load(&args.templates)
        .with_context(|| format!("Failed to load templates from {}", args.templates.display()))?;

    let prepared = build_prompts(&history, &templates, &args.template, args.num_msg)?;
    write_prepared(&args.save_path, &prepared)?;

    Ok(())
}

/// Maps a top-level failure to the process exit code.
pub fn exit_code_for(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<Error>() {
        Some(Error::QuotaExhausted(_)) => EXIT_QUOTA_EXHAUSTED,
        Some(Error::CorruptCache { .. }) => EXIT_CORRUPT_CACHE,
        _ => 1,
    }
}

/// Prints a diagnostic for `error` and picks the process exit code.
#[allow(clippy::print_stderr, reason = "Fatal diagnostics go straight to the terminal")]
pub fn report_failure(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<Error>() {
        Some(Error::QuotaExhausted(message)) => {
            eprintln!("Key exhausted; use a different key and re-run ({message})");
        }
        Some(Error::CorruptCache { path, source }) => {
            eprintln!("Cache file {} is unreadable: {source}", path.display());
            eprintln!("Restore it from a backup or move it aside to start an empty cache");
        }
        _ => eprintln!("Error: {error:#}"),
    }
    ExitCode::from(exit_code_for(error))
}
