//! App-wide constants.
//!
//! Centralises the tool name, config paths, environment variable names,
//! comment markers and label vocabulary so a rename only requires
//! changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "reviewbench";

/// Crate version, as reported by `reviewbench version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Local config filename (e.g. `.reviewbench.toml` in the working directory).
pub const CONFIG_FILENAME: &str = ".reviewbench.toml";

/// Directory name under `~/.config/` for global config.
pub const CONFIG_DIR: &str = "reviewbench";

/// Default GitLab instance.
pub const DEFAULT_GITLAB_URL: &str = "https://gitlab.com";

/// Default base URL for a self-hosted OpenAI-compatible model server.
pub const DEFAULT_LOCAL_URL: &str = "http://localhost:6655/v1";

// ── Environment variable names ──────────────────────────────────────

pub const ENV_PROVIDER: &str = "REVIEWBENCH_PROVIDER";
pub const ENV_MODEL: &str = "REVIEWBENCH_MODEL";
pub const ENV_API_KEY: &str = "REVIEWBENCH_API_KEY";
pub const ENV_BASE_URL: &str = "REVIEWBENCH_BASE_URL";
pub const ENV_LOG: &str = "REVIEWBENCH_LOG";
pub const ENV_GITLAB_URL: &str = "GITLAB_URL";
pub const ENV_GITLAB_TOKEN: &str = "GITLAB_TOKEN";
pub const ENV_GITLAB_PROJECT: &str = "GITLAB_PROJECT";
pub const ENV_GITLAB_GROUP: &str = "GITLAB_GROUP_PATH";
pub const ENV_GITLAB_USER: &str = "GITLAB_USER_ID";

// ── Comment markers ─────────────────────────────────────────────────

/// Heading of the note posted by the initial (lead) review.
pub const INITIAL_REVIEW_MARKER: &str = "### 🤖 AI Lead Summary";

/// Heading of the note posted by a follow-up review of a new revision.
pub const FOLLOW_UP_MARKER: &str = "### 👋 Friendly Code Review";

/// Heading of the benchmark report note.
pub const BENCHMARK_REPORT_MARKER: &str = "### 🧪 Automated Benchmark Report";

/// Number of characters of a revision id shown in notes.
pub const SHORT_REVISION_LEN: usize = 8;

// ── Labels ──────────────────────────────────────────────────────────

pub const LABEL_READY: &str = "ready-for-merge";
pub const LABEL_NEEDS_REVIEW: &str = "needs-review";
pub const LABEL_CHANGES_REQUESTED: &str = "changes-requested";
