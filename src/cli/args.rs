//! Clap argument types.

use clap::Parser;
use std::path::PathBuf;

use reviewbench::models::ProviderName;
use reviewbench::output::OutputFormat;

/// Benchmark harness and review bot for LLM code reviewers.
#[derive(Parser, Debug)]
#[command(name = "reviewbench", version = reviewbench::constants::VERSION)]
pub struct Cli {
    /// Log at debug level (RUST_LOG still takes precedence).
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Run benchmark scenarios end to end against GitLab.
    Bench(BenchArgs),

    /// Watch a project and review its merge requests.
    Listen(ListenArgs),

    /// Print version information.
    Version,
}

/// Provider selection shared by `bench` and `listen`.
#[derive(clap::Args, Debug, Default)]
pub struct ProviderArgs {
    /// LLM provider: gemini, openai, anthropic, openai-compatible (alias: local).
    #[arg(long)]
    pub provider: Option<ProviderName>,

    /// Model name (defaults to the provider's default model).
    #[arg(long)]
    pub model: Option<String>,

    /// Base URL for OpenAI-compatible servers.
    #[arg(long)]
    pub base_url: Option<String>,
}

/// Arguments for the `bench` subcommand.
#[derive(Parser, Debug)]
pub struct BenchArgs {
    /// Scenario file or directory of `*.toml` scenario files.
    #[arg(long, default_value = "scenarios")]
    pub scenarios: PathBuf,

    /// Comma-separated scenario ids to run (default: all).
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    #[command(flatten)]
    pub provider: ProviderArgs,

    /// GitLab namespace to create benchmark projects in.
    #[arg(long)]
    pub group: Option<String>,

    /// Output format for the suite summary.
    #[arg(long, default_value = "terminal")]
    pub format: OutputFormat,

    /// Generate repository context for the reviewer from each scenario's files.
    #[arg(long, default_value_t = false, conflicts_with = "compare_context")]
    pub with_context: bool,

    /// Run the suite without and then with generated repository context,
    /// and report both side by side.
    #[arg(long, default_value_t = false)]
    pub compare_context: bool,
}

/// Arguments for the `listen` subcommand.
#[derive(Parser, Debug)]
pub struct ListenArgs {
    /// Project to watch (numeric id or `group/name` path).
    #[arg(long)]
    pub project: Option<String>,

    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Seconds between polls.
    #[arg(long)]
    pub interval: Option<u64>,

    /// File whose content is given to the reviewer as repository context.
    #[arg(long)]
    pub context_file: Option<PathBuf>,
}
