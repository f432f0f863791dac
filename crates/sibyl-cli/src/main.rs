//! Sibyl CLI - cached, rate-limited batch completions over per-user prompts
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        reason = "Allow for tests"
    )
)]

use clap::Parser as _;
use cli::{Cli, Commands};
use std::io;
use std::process::ExitCode;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

mod cli;
mod handlers;

/// Log directives used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str =
    "sibyl_cli=info,sibyl_runner=info,sibyl_cache=info,sibyl_providers=info,sibyl_core=info";

#[tokio::main]
async fn main() -> ExitCode {
    Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run(args) => handlers::handle_run(cli.config.as_deref(), &args).await,
        Commands::Prepare(args) => handlers::handle_prepare(&args),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => handlers::report_failure(&error),
    }
}
