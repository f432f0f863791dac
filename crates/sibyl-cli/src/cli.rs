use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the sibyl CLI
#[derive(Debug, Parser)]
#[command(name = "sibyl", version)]
#[command(about = "Cached, rate-limited batch completions over per-user prompts", long_about = None)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        help = "Config file [default: ~/.sibyl/config.toml, created on first use]"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Request one prediction per user, reusing cached completions")]
    Run(RunArgs),

    #[command(about = "Build per-user prompts from message history and a template")]
    Prepare(PrepareArgs),
}

/// Arguments of `sibyl run`
#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long, help = "Prompt JSON file keyed by user id")]
    pub data_path: PathBuf,

    #[arg(long, help = "Where to write the prediction CSV")]
    pub save_path: PathBuf,

    #[arg(long, help = "Response cache file (overrides config)")]
    pub cache_path: Option<PathBuf>,

    #[arg(long, help = "Max tokens to generate per prompt (overrides config)")]
    pub max_tokens: Option<u32>,

    #[arg(long, help = "Completion model (overrides config)")]
    pub model: Option<String>,
}

/// Arguments of `sibyl prepare`
#[derive(Debug, Args)]
pub struct PrepareArgs {
    #[arg(long, help = "Message history JSON file keyed by user id")]
    pub data_path: PathBuf,

    #[arg(long, help = "TOML file with a [templates] table")]
    pub templates: PathBuf,

    #[arg(long, alias = "expt-name", help = "Name of the template to use")]
    pub template: String,

    #[arg(long, help = "Where to write the prompt JSON")]
    pub save_path: PathBuf,

    #[arg(long, default_value_t = 20, help = "Number of most recent messages per user")]
    pub num_msg: usize,
}
