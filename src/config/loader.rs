//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables
//! 3. `.reviewbench.toml` in the working directory
//! 4. `~/.config/reviewbench/config.toml` (global defaults)
//! 5. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::constants::{
    DEFAULT_GITLAB_URL, ENV_API_KEY, ENV_BASE_URL, ENV_GITLAB_GROUP, ENV_GITLAB_PROJECT,
    ENV_GITLAB_TOKEN, ENV_GITLAB_URL, ENV_GITLAB_USER, ENV_LOG, ENV_MODEL, ENV_PROVIDER,
    LABEL_CHANGES_REQUESTED, LABEL_NEEDS_REVIEW, LABEL_READY,
};
use crate::diff::DEFAULT_SIMILARITY_THRESHOLD;
use crate::env::Env;
use crate::models::ProviderName;

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub review: ReviewConfig,
    pub gitlab: GitLabConfig,
    pub listener: ListenerConfig,
    pub runner: RunnerConfig,
    pub logging: LoggingConfig,
}

/// LLM provider configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: ProviderName,
    /// Model name. Empty means the provider's default model.
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_output_tokens: u64,
    /// Retries for transient API errors inside a single `ask`.
    pub request_retries: u32,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("request_retries", &self.request_retries)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: ProviderName::Gemini,
            model: String::new(),
            base_url: None,
            api_key: None,
            temperature: 0.1,
            max_output_tokens: 4000,
            request_retries: 3,
        }
    }
}

impl ProviderConfig {
    /// The configured model, or the provider's default.
    pub fn resolved_model(&self) -> &str {
        if self.model.trim().is_empty() {
            self.name.default_model()
        } else {
            self.model.trim()
        }
    }
}

/// Review pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub similarity_threshold: f64,
    pub min_valid_suggestions: usize,
    pub max_retries_per_agent: u32,
    pub retry_delay_ms: u64,
    /// Number of recent unmatched snippets fed back into the next prompt.
    pub feedback_window: usize,
    pub allowed_extensions: Vec<String>,
    pub valid_labels: Vec<String>,
    pub use_repo_context: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            min_valid_suggestions: 2,
            max_retries_per_agent: 30,
            retry_delay_ms: 2000,
            feedback_window: 5,
            allowed_extensions: ["go", "py", "js", "java", "cpp", "ts", "rs"]
                .into_iter()
                .map(String::from)
                .collect(),
            valid_labels: [LABEL_READY, LABEL_NEEDS_REVIEW, LABEL_CHANGES_REQUESTED]
                .into_iter()
                .map(String::from)
                .collect(),
            use_repo_context: false,
        }
    }
}

/// GitLab connection settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitLabConfig {
    pub url: String,
    pub token: Option<String>,
    /// Project watched by `listen` (numeric id or `group/name` path).
    pub project: Option<String>,
    /// Namespace benchmark projects are created in.
    pub group: Option<String>,
    /// Suffix that keeps concurrent benchmark runs apart.
    pub user_tag: String,
}

impl std::fmt::Debug for GitLabConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("project", &self.project)
            .field("group", &self.group)
            .field("user_tag", &self.user_tag)
            .finish()
    }
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_GITLAB_URL.to_string(),
            token: None,
            project: None,
            group: None,
            user_tag: "bench".to_string(),
        }
    }
}

/// Continuous listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub poll_interval_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
        }
    }
}

/// Local test execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            command: ["pytest", ".", "-v", "--tb=short"]
                .into_iter()
                .map(String::from)
                .collect(),
            timeout_secs: 15,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory receiving `transcript.jsonl`; unset disables transcripts.
    pub transcript_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            transcript_dir: None,
        }
    }
}

/// Settings the review components are constructed with.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewerConfig {
    pub provider: ProviderName,
    pub temperature: f64,
    pub max_output_tokens: u64,
    pub similarity_threshold: f64,
    pub min_valid_suggestions: usize,
    pub max_retries_per_agent: u32,
    pub retry_delay: Duration,
    pub feedback_window: usize,
}

impl Default for ReviewerConfig {
    fn default() -> Self {
        Config::default().reviewer()
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads from global config, repo-local config, then applies
    /// environment variable overrides.
    pub fn load(repo_root: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Layer 4: global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                config.merge(global);
            }
        }

        // Layer 3: repo-local config
        if let Some(root) = repo_root {
            let local_path = root.join(crate::constants::CONFIG_FILENAME);
            if local_path.exists() {
                let local = Self::load_file(&local_path)?;
                config.merge(local);
            }
        }

        // Layer 2: environment variables
        config.apply_env_vars(env);

        Ok(config)
    }

    /// Project the review value object.
    pub fn reviewer(&self) -> ReviewerConfig {
        ReviewerConfig {
            provider: self.provider.name,
            temperature: self.provider.temperature,
            max_output_tokens: self.provider.max_output_tokens,
            similarity_threshold: self.review.similarity_threshold,
            min_valid_suggestions: self.review.min_valid_suggestions,
            max_retries_per_agent: self.review.max_retries_per_agent,
            retry_delay: Duration::from_millis(self.review.retry_delay_ms),
            feedback_window: self.review.feedback_window,
        }
    }

    /// Load a config from a specific file.
    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the global config file path.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(crate::constants::CONFIG_DIR).join("config.toml"))
    }

    /// Merge another config into this one (other takes precedence for
    /// non-default values).
    fn merge(&mut self, other: Config) {
        let default_provider = ProviderConfig::default();
        if other.provider.name != default_provider.name {
            self.provider.name = other.provider.name;
        }
        if other.provider.model != default_provider.model {
            self.provider.model = other.provider.model;
        }
        if other.provider.base_url.is_some() {
            self.provider.base_url = other.provider.base_url;
        }
        if other.provider.api_key.is_some() {
            self.provider.api_key = other.provider.api_key;
        }
        if other.provider.temperature != default_provider.temperature {
            self.provider.temperature = other.provider.temperature;
        }
        if other.provider.max_output_tokens != default_provider.max_output_tokens {
            self.provider.max_output_tokens = other.provider.max_output_tokens;
        }
        if other.provider.request_retries != default_provider.request_retries {
            self.provider.request_retries = other.provider.request_retries;
        }

        let default_review = ReviewConfig::default();
        if other.review.similarity_threshold != default_review.similarity_threshold {
            self.review.similarity_threshold = other.review.similarity_threshold;
        }
        if other.review.min_valid_suggestions != default_review.min_valid_suggestions {
            self.review.min_valid_suggestions = other.review.min_valid_suggestions;
        }
        if other.review.max_retries_per_agent != default_review.max_retries_per_agent {
            self.review.max_retries_per_agent = other.review.max_retries_per_agent;
        }
        if other.review.retry_delay_ms != default_review.retry_delay_ms {
            self.review.retry_delay_ms = other.review.retry_delay_ms;
        }
        if other.review.feedback_window != default_review.feedback_window {
            self.review.feedback_window = other.review.feedback_window;
        }
        if other.review.allowed_extensions != default_review.allowed_extensions {
            self.review.allowed_extensions = other.review.allowed_extensions;
        }
        if other.review.valid_labels != default_review.valid_labels {
            self.review.valid_labels = other.review.valid_labels;
        }
        if other.review.use_repo_context {
            self.review.use_repo_context = true;
        }

        let default_gitlab = GitLabConfig::default();
        if other.gitlab.url != default_gitlab.url {
            self.gitlab.url = other.gitlab.url;
        }
        if other.gitlab.token.is_some() {
            self.gitlab.token = other.gitlab.token;
        }
        if other.gitlab.project.is_some() {
            self.gitlab.project = other.gitlab.project;
        }
        if other.gitlab.group.is_some() {
            self.gitlab.group = other.gitlab.group;
        }
        if other.gitlab.user_tag != default_gitlab.user_tag {
            self.gitlab.user_tag = other.gitlab.user_tag;
        }

        if other.listener.poll_interval_secs != ListenerConfig::default().poll_interval_secs {
            self.listener.poll_interval_secs = other.listener.poll_interval_secs;
        }

        let default_runner = RunnerConfig::default();
        if other.runner.command != default_runner.command {
            self.runner.command = other.runner.command;
        }
        if other.runner.timeout_secs != default_runner.timeout_secs {
            self.runner.timeout_secs = other.runner.timeout_secs;
        }

        if other.logging.level != LoggingConfig::default().level {
            self.logging.level = other.logging.level;
        }
        if other.logging.transcript_dir.is_some() {
            self.logging.transcript_dir = other.logging.transcript_dir;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_vars(&mut self, env: &Env) {
        match env.parse::<ProviderName>(ENV_PROVIDER) {
            Some(Ok(name)) => self.provider.name = name,
            Some(Err(raw)) => {
                tracing::warn!("ignoring invalid {ENV_PROVIDER} value: {raw}");
            }
            None => {}
        }
        if let Some(val) = env.get(ENV_MODEL) {
            self.provider.model = val;
        }
        if let Some(val) = env.get(ENV_BASE_URL) {
            self.provider.base_url = Some(val);
        }

        // Provider-specific API key resolution
        let api_key = env.first_of(&[ENV_API_KEY, self.provider.name.api_key_env_var()]);
        if api_key.is_some() {
            self.provider.api_key = api_key;
        }

        if let Some(val) = env.get(ENV_GITLAB_URL) {
            self.gitlab.url = val;
        }
        if let Some(val) = env.get(ENV_GITLAB_TOKEN) {
            self.gitlab.token = Some(val);
        }
        if let Some(val) = env.get(ENV_GITLAB_PROJECT) {
            self.gitlab.project = Some(val);
        }
        if let Some(val) = env.get(ENV_GITLAB_GROUP) {
            self.gitlab.group = Some(val);
        }
        if let Some(val) = env.get(ENV_GITLAB_USER) {
            self.gitlab.user_tag = val;
        }
        if let Some(val) = env.get(ENV_LOG) {
            self.logging.level = val;
        }
    }
}
