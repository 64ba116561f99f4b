//! reviewbench: benchmark harness and review bot for LLM code reviewers.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use reviewbench::bench;
use reviewbench::config;
use reviewbench::constants;
use reviewbench::diff;
use reviewbench::env;
use reviewbench::host;
use reviewbench::listener;
use reviewbench::logging;
use reviewbench::output;
use reviewbench::providers;
use reviewbench::review;
use reviewbench::runner;
use reviewbench::transcript;

use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;

use cli::args::{BenchArgs, Cli, Command, ListenArgs, ProviderArgs};
use config::Config;
use env::Env;
use host::gitlab::{GitLabClient, GitLabHost, GitLabProvisioner};
use providers::rig::RigProvider;
use review::{ContextSource, Reviewer};
use transcript::Transcript;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Bench(args) => run_bench(args, cli.verbose).await,
        Command::Listen(args) => run_listen(args, cli.verbose).await,
        Command::Version => run_version(),
    }
}

/// Print version information.
fn run_version() -> Result<()> {
    use colored::Colorize;

    println!(
        "{} {}",
        constants::APP_NAME.bold(),
        constants::VERSION.green().bold()
    );
    Ok(())
}

/// Load layered config from the working directory and the environment,
/// then start logging.
fn load_config(env: &Env, verbose: bool) -> Result<Config> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let config = Config::load(Some(&cwd), env).context("failed to load configuration")?;
    logging::init(&logging::effective_level(&config.logging.level, verbose));
    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}

/// Layer CLI provider flags over the loaded config.
///
/// Switching provider on the command line also switches to that
/// provider's API key variable unless a generic key was given.
fn apply_provider_args(config: &mut Config, args: &ProviderArgs, env: &Env) {
    if let Some(name) = args.provider {
        if name != config.provider.name {
            config.provider.name = name;
            if env.get(constants::ENV_API_KEY).is_none() {
                config.provider.api_key = env.get(name.api_key_env_var());
            }
        }
    }
    if let Some(model) = &args.model {
        config.provider.model = model.clone();
    }
    if let Some(url) = &args.base_url {
        config.provider.base_url = Some(url.clone());
    }
}

/// Build the reviewer from config.
fn build_reviewer(config: &Config) -> Result<Reviewer> {
    let provider =
        RigProvider::new(config.provider.clone()).context("failed to configure LLM provider")?;
    tracing::info!(provider = %config.provider.name, model = provider.model(), "provider ready");

    Ok(Reviewer::new(
        Arc::new(provider),
        config.reviewer(),
        diff::ExtensionFilter::new(&config.review.allowed_extensions),
        config.review.valid_labels.clone(),
    )
    .with_transcript(transcript_for(config)))
}

fn gitlab_client(config: &Config) -> Result<GitLabClient> {
    GitLabClient::new(&config.gitlab.url, config.gitlab.token.as_deref())
        .context("failed to configure GitLab client")
}

/// Run benchmark scenarios and print the suite summary, or the
/// with/without repository context comparison.
async fn run_bench(args: BenchArgs, verbose: bool) -> Result<()> {
    let env = Env::real();
    let mut config = load_config(&env, verbose)?;
    apply_provider_args(&mut config, &args.provider, &env);
    if let Some(group) = &args.group {
        config.gitlab.group = Some(group.clone());
    }

    let scenarios = bench::scenario::load(&args.scenarios)
        .with_context(|| format!("failed to load scenarios from {}", args.scenarios.display()))?;
    let scenarios = bench::scenario::select(scenarios, &args.only);
    if scenarios.is_empty() {
        bail!("no scenarios to run");
    }

    let reviewer = build_reviewer(&config)?;
    let provisioner = GitLabProvisioner::new(gitlab_client(&config)?, config.gitlab.group.clone());
    let test_runner = runner::CommandTestRunner::new(&config.runner);
    let context = if args.with_context || config.review.use_repo_context {
        ContextSource::Generated
    } else {
        ContextSource::None
    };

    let transcript = transcript_for(&config);
    let mut bench = bench::BenchmarkRunner::new(
        Arc::new(provisioner),
        Arc::new(test_runner),
        reviewer,
        config.gitlab.user_tag.clone(),
    )
    .with_context(context)
    .with_transcript(transcript);

    let renderer = output::renderer_for(args.format);
    let crashed = if args.compare_context {
        let comparison = bench.compare_context(&scenarios).await;
        print!("{}", renderer.render_comparison(&comparison));
        comparison.without_context.crashed + comparison.with_context.crashed
    } else {
        let summary = bench.run_suite(&scenarios).await;
        print!("{}", renderer.render(&summary));
        summary.crashed
    };

    if crashed > 0 {
        bail!("{crashed} scenario run(s) crashed");
    }
    Ok(())
}

fn transcript_for(config: &Config) -> Transcript {
    config
        .logging
        .transcript_dir
        .as_deref()
        .map(Transcript::in_dir)
        .unwrap_or_default()
}

/// Review merge requests of one project until interrupted.
async fn run_listen(args: ListenArgs, verbose: bool) -> Result<()> {
    let env = Env::real();
    let mut config = load_config(&env, verbose)?;
    apply_provider_args(&mut config, &args.provider, &env);
    if let Some(project) = &args.project {
        config.gitlab.project = Some(project.clone());
    }
    let Some(project) = config.gitlab.project.clone() else {
        bail!(
            "no project to watch. Pass --project or set {}",
            constants::ENV_GITLAB_PROJECT
        );
    };
    let interval = Duration::from_secs(
        args.interval
            .unwrap_or(config.listener.poll_interval_secs)
            .max(1),
    );

    let reviewer = build_reviewer(&config)?;
    let repo_context = match &args.context_file {
        Some(path) => {
            ContextSource::Static(read_context_file(path)?)
                .resolve(reviewer.provider(), None, &project)
                .await
        }
        None => None,
    };
    let host = GitLabHost::new(gitlab_client(&config)?, project.as_str());
    tracing::info!(%project, url = %config.gitlab.url, "watching project");

    let mut listener = listener::Listener::new(Arc::new(host), reviewer, interval)
        .with_repo_context(repo_context);
    listener.run().await;
    Ok(())
}

fn read_context_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read context file {}", path.display()))
}
